use clap::Parser;
use point_rtree::config::LoggingConfig;
use point_rtree::{IndexConfig, RTree};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::PathBuf;
use tracing::{info, warn, Level};

type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// 配置文件路径
    #[arg(short, long, default_value = "rtree.toml")]
    config: String,

    /// 生成默认配置文件并退出
    #[arg(long)]
    generate_config: bool,

    /// Number of random points to insert
    #[arg(short = 'n', long, default_value_t = 1000)]
    points: usize,

    /// Random seed
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Search origin, comma separated (defaults to the centre of the data space)
    #[arg(long, value_delimiter = ',')]
    origin: Vec<f64>,

    /// Search radius
    #[arg(short, long, default_value_t = 10.0)]
    radius: f64,

    /// Number of inserted points to delete afterwards
    #[arg(long, default_value_t = 0)]
    delete: usize,

    /// Max entries per page (overrides config file)
    #[arg(short, long)]
    max_entries: Option<usize>,

    /// Log level (overrides config file)
    #[arg(long)]
    log_level: Option<String>,

    /// Dump the final tree to this file (.json or binary)
    #[arg(long)]
    dump: Option<PathBuf>,

    /// Write the nested JSON view of the tree to this file
    #[arg(long)]
    export: Option<PathBuf>,
}

/// 数据空间每个坐标轴的范围
const SPACE: f64 = 100.0;

fn main() -> Result<()> {
    let args = Args::parse();

    // 生成默认配置文件
    if args.generate_config {
        IndexConfig::default().save_to_file(&args.config)?;
        println!("Generated default configuration: {}", args.config);
        return Ok(());
    }

    // 加载配置，命令行参数覆盖配置文件
    let mut config = IndexConfig::from_file(&args.config)?;
    if let Some(max_entries) = args.max_entries {
        config.tree.max_entries = max_entries;
    }
    if let Some(log_level) = args.log_level {
        config.logging.level = log_level;
    }
    config.validate()?;

    init_logging(&config.logging)?;
    info!("rtree-demo {}", env!("CARGO_PKG_VERSION"));
    info!(
        "M = {}, m = {}, dimensions = {}",
        config.tree.max_entries,
        config.tree.min_fill(),
        config.tree.dimensions
    );

    let dims = config.tree.dimensions;
    let mut rtree = RTree::with_config(config.tree)?;

    // 插入随机点，负载为插入序号
    let mut rng = StdRng::seed_from_u64(args.seed);
    let points: Vec<Vec<f64>> = (0..args.points)
        .map(|_| (0..dims).map(|_| rng.gen_range(0.0..SPACE)).collect())
        .collect();
    for (i, point) in points.iter().enumerate() {
        rtree.insert(point, i)?;
    }
    info!("inserted {} points: {}", points.len(), rtree.stats());
    rtree.print_tree_structure_debug();

    // 半径搜索
    let origin = if args.origin.is_empty() {
        vec![SPACE / 2.0; dims]
    } else {
        args.origin.clone()
    };
    let result = rtree.search(&origin, args.radius)?;
    println!(
        "search({:?}, {}) -> {} points, {} pages visited",
        origin,
        args.radius,
        result.len(),
        result.visited.len()
    );
    for entry in result.points.iter().take(10) {
        println!("  #{} {:?}", entry.payload, entry.coords);
    }
    if result.len() > 10 {
        println!("  ... {} more", result.len() - 10);
    }

    // 删除前若干个点
    for point in points.iter().take(args.delete) {
        if let Err(e) = rtree.delete(point) {
            warn!("failed to delete {:?}: {}", point, e);
        }
    }
    if args.delete > 0 {
        info!("after deleting {} points: {}", args.delete, rtree.stats());
    }

    rtree.verify()?;
    println!("{}", rtree.stats());

    if let Some(path) = &args.export {
        std::fs::write(path, rtree.export_to_json()?)?;
        info!("exported tree structure to {}", path.display());
    }
    if let Some(path) = &args.dump {
        rtree.dump_to_file(path)?;
    }

    Ok(())
}

/// 初始化日志系统
fn init_logging(config: &LoggingConfig) -> Result<()> {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let filter = match config.level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    let level = tracing_subscriber::filter::LevelFilter::from_level(filter);

    match (config.output.as_str(), &config.log_file) {
        ("file", Some(log_file)) => {
            // 确保日志目录存在
            if let Some(parent) = log_file.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(log_file)?;

            tracing_subscriber::registry()
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(file)
                        .with_ansi(false)
                        .with_target(false),
                )
                .with(level)
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(tracing_subscriber::fmt::layer().with_target(false))
                .with(level)
                .init();
        }
    }
    Ok(())
}
