use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};

use crate::http::ReqwestTransport;
use crate::runner::{RunContext, RunTotals, Runner, SummaryReporter};
use crate::variable::AppVars;

/// 变量文件名，目录扫描时跳过
pub const ENV_FILE_NAME: &str = "env.toml";

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 执行单个请求文件或整个目录
    Run {
        /// 请求文件或目录
        path: String,

        /// 变量文件(TOML)
        #[arg(short, long)]
        environment: Option<String>,

        /// 输出调试细节
        #[arg(short, long)]
        verbose: bool,
    },

    /// 校验请求文件而不执行
    Check {
        /// 请求文件或目录
        path: String,
    },
}

/// 执行 run 子命令，返回本次运行的统计
pub async fn run(path: &str, environment: Option<&str>, verbose: bool) -> anyhow::Result<RunTotals> {
    let vars = match environment {
        Some(file) => AppVars::from_file(file)
            .with_context(|| format!("Couldn't load environment \"{}\"", file))?,
        None => AppVars::new(),
    };

    let files = collect_spec_files(Path::new(path))?;
    if files.is_empty() {
        bail!("No requests found under \"{}\"", path);
    }

    let mut runner = Runner::new(ReqwestTransport);
    for file in &files {
        runner
            .add_file(file)
            .with_context(|| format!("Couldn't read \"{}\"", file.display()))?;
    }

    let mut ctx = RunContext::new(vars, verbose);
    runner.run(&mut ctx).await;
    SummaryReporter::print(&ctx.totals, &ctx.logger);

    Ok(ctx.totals)
}

/// 收集要执行的请求文件
///
/// 参数是文件时直接使用；是目录时递归扫描 `.toml` 文件，
/// 目录按路径字典序排列（父目录先于子目录），同一目录内
/// 的文件再按字典序排列，`env.toml` 除外。
pub fn collect_spec_files(path: &Path) -> anyhow::Result<Vec<PathBuf>> {
    if path.is_file() {
        if path.extension().is_none_or(|ext| ext != "toml") {
            bail!("Expected *.toml, found \"{}\"", path.display());
        }
        return Ok(vec![path.to_path_buf()]);
    }
    if !path.is_dir() {
        bail!("\"{}\" is neither a file nor a directory", path.display());
    }

    let mut dirs = Vec::new();
    gather_dirs(path, &mut dirs)?;
    dirs.sort();

    let mut files = Vec::new();
    for dir in dirs {
        let mut here: Vec<PathBuf> = std::fs::read_dir(&dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.is_file()
                    && path.extension().is_some_and(|ext| ext == "toml")
                    && path.file_name().is_none_or(|name| name != ENV_FILE_NAME)
            })
            .collect();
        here.sort();
        files.extend(here);
    }
    Ok(files)
}

fn gather_dirs(dir: &Path, dirs: &mut Vec<PathBuf>) -> anyhow::Result<()> {
    dirs.push(dir.to_path_buf());
    for entry in std::fs::read_dir(dir)
        .with_context(|| format!("Couldn't read directory \"{}\"", dir.display()))?
    {
        let path = entry?.path();
        if path.is_dir() {
            gather_dirs(&path, dirs)?;
        }
    }
    Ok(())
}
