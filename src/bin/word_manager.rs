use anyhow::{Context, Result, anyhow};
use clap::{App, Arg, ArgMatches, SubCommand};
use daily_word::codec::{self, XorCodec};
use daily_word::word_bank::CorpusFiles;
use daily_word::{Config, DailyClock, Mode, WordBank};
use std::path::{Path, PathBuf};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

fn mode_arg(index: usize) -> Arg<'static> {
    Arg::with_name("mode")
        .help("单词长度 (4、5 或 6)")
        .required(true)
        .index(index)
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = App::new("word-manager")
        .version("1.0")
        .about("生成和检查每日词库")
        .arg(
            Arg::with_name("dir")
                .long("dir")
                .takes_value(true)
                .help("词库目录 (默认取 words.dir)"),
        )
        .subcommand(
            SubCommand::with_name("encode")
                .about("把纯文本词表编码为 sol<N>.dat 和 val<N>.dat")
                .arg(mode_arg(1))
                .arg(
                    Arg::with_name("solutions")
                        .help("答案词表，每行一个或逗号分隔")
                        .required(true)
                        .index(2),
                )
                .arg(
                    Arg::with_name("allowed")
                        .help("额外允许的猜测词")
                        .required(true)
                        .index(3),
                ),
        )
        .subcommand(
            SubCommand::with_name("audit")
                .about("统计答案数量并列出疑似复数")
                .arg(Arg::with_name("mode").help("单词长度").index(1)),
        )
        .subcommand(
            SubCommand::with_name("clean-plurals")
                .about("从答案词表中删除疑似复数")
                .arg(mode_arg(1)),
        )
        .subcommand(
            SubCommand::with_name("check")
                .about("检查单词能否作为猜测")
                .arg(mode_arg(1))
                .arg(Arg::with_name("word").required(true).index(2)),
        )
        .subcommand(
            SubCommand::with_name("hash")
                .about("输出单词的校验哈希")
                .arg(Arg::with_name("word").required(true).index(1)),
        )
        .subcommand(SubCommand::with_name("today").about("显示今天的题号和倒计时"))
        .get_matches();

    Config::init()?;
    let config = Config::get().cloned().unwrap_or_default();

    tracing_subscriber::registry()
        .with(EnvFilter::new(config.log_filter()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let dir = matches
        .value_of("dir")
        .map(PathBuf::from)
        .unwrap_or_else(|| config.words.dir.clone());

    match matches.subcommand() {
        Some(("encode", args)) => encode(&dir, args).await,
        Some(("audit", args)) => audit(&dir, args).await,
        Some(("clean-plurals", args)) => clean_plurals(&dir, args).await,
        Some(("check", args)) => check(&dir, args).await,
        Some(("hash", args)) => {
            let word = codec::normalize(required(args, "word")?);
            let (hash, hex) = (codec::word_hash(&word), codec::word_hash_hex(&word));
            println!("{}: {} (0x{})", word, hash, hex);
            Ok(())
        }
        Some(("today", _)) => {
            today();
            Ok(())
        }
        _ => {
            println!("使用 --help 查看可用命令");
            Ok(())
        }
    }
}

fn required<'a>(args: &'a ArgMatches, name: &str) -> Result<&'a str> {
    args.value_of(name)
        .ok_or_else(|| anyhow!("缺少参数 <{}>", name))
}

fn parse_mode(args: &ArgMatches) -> Result<Mode> {
    required(args, "mode")?.parse::<Mode>().map_err(|e| anyhow!(e))
}

/// 读取纯文本词表：按逗号和空白切分并转大写，
/// 只保留长度符合模式的纯字母单词
async fn read_word_list(path: &Path, mode: Mode) -> Result<Vec<String>> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("读取 {} 失败", path.display()))?;

    let mut skipped = 0usize;
    let words: Vec<String> = text
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|w| !w.is_empty())
        .map(codec::normalize)
        .filter(|w| {
            let ok = w.chars().count() == mode.word_length()
                && w.chars().all(|c| c.is_ascii_alphabetic());
            if !ok {
                skipped += 1;
            }
            ok
        })
        .collect();

    if skipped > 0 {
        tracing::warn!(path = %path.display(), skipped, "跳过了格式不符的单词");
    }
    Ok(words)
}

async fn encode(dir: &Path, args: &ArgMatches) -> Result<()> {
    let mode = parse_mode(args)?;
    let solutions = read_word_list(Path::new(required(args, "solutions")?), mode).await?;
    let allowed = read_word_list(Path::new(required(args, "allowed")?), mode).await?;
    if solutions.is_empty() {
        return Err(anyhow!("没有可用的答案词"));
    }

    let files = CorpusFiles::encode(&solutions, &allowed);
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("创建 {} 失败", dir.display()))?;
    write_file(&dir.join(mode.solutions_file()), &files.solutions).await?;
    write_file(&dir.join(mode.validation_file()), &files.validation).await?;

    println!(
        "已编码 {} 个答案和 {} 条词典记录到 {}",
        solutions.len(),
        files.validation.len() / 4,
        dir.display()
    );
    Ok(())
}

async fn audit(dir: &Path, args: &ArgMatches) -> Result<()> {
    let modes = match args.value_of("mode") {
        Some(_) => vec![parse_mode(args)?],
        None => Mode::ALL.to_vec(),
    };

    let bank = WordBank::from_dir(dir);
    for mode in modes {
        let corpus = match bank.load(mode).await {
            Ok(corpus) => corpus,
            Err(e) => {
                println!("{} 字母：不可用 ({})", mode, e);
                continue;
            }
        };

        let report = corpus.audit();
        println!("{} 字母:", report.mode);
        println!("  答案数: {}", report.total_words);
        println!("  词典数: {}", report.dictionary_size);
        println!("  疑似复数: {}", report.plural_count);
        if !report.plural_sample.is_empty() {
            println!("  示例: {}", report.plural_sample.join(", "));
        }
    }
    Ok(())
}

async fn clean_plurals(dir: &Path, args: &ArgMatches) -> Result<()> {
    let mode = parse_mode(args)?;
    let path = dir.join(mode.solutions_file());
    let bytes = tokio::fs::read(&path)
        .await
        .with_context(|| format!("读取 {} 失败", path.display()))?;

    let xor = XorCodec::default();
    let words = xor.decode(&bytes)?;
    let kept: Vec<&String> = words
        .iter()
        .filter(|w| !codec::is_plural_candidate(w))
        .collect();
    if kept.is_empty() {
        return Err(anyhow!("所有答案都像复数，拒绝写入空词表"));
    }

    write_file(&path, &xor.encode(&kept)).await?;
    println!(
        "{}: 共 {} 个，删除 {} 个，剩余 {} 个",
        path.display(),
        words.len(),
        words.len() - kept.len(),
        kept.len()
    );
    Ok(())
}

async fn check(dir: &Path, args: &ArgMatches) -> Result<()> {
    let mode = parse_mode(args)?;
    let word = codec::normalize(required(args, "word")?);

    let bank = WordBank::from_dir(dir);
    bank.load(mode).await?;
    if bank.is_valid_guess(&word, mode)? {
        println!("{} 可以作为猜测", word);
    } else {
        println!("{} 不在词库中", word);
    }
    Ok(())
}

fn today() {
    let clock = DailyClock::system();
    let day = clock.today_index();
    let left = clock.time_until_next_index().as_secs();
    match clock.date_for_index(day) {
        Some(date) => println!("第 {} 天 ({})", day, date),
        None => println!("第 {} 天", day),
    }
    println!(
        "距下一题还有 {:02}:{:02}:{:02}",
        left / 3600,
        left % 3600 / 60,
        left % 60
    );
}

async fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    tokio::fs::write(path, bytes)
        .await
        .with_context(|| format!("写入 {} 失败", path.display()))
}
