use anyhow::{Context, Result};
use clap::{Parser as ClapParser, ValueEnum};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use stratamark::error::Error;
use stratamark::renderer::HtmlRenderer;
use stratamark::{Options, Parser, json};
use tracing::debug;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    Html,
    Json,
}

#[derive(ClapParser)]
#[command(name = "stratamark")]
#[command(about = "Render Markdown as HTML or a JSON syntax tree")]
#[command(version)]
struct Cli {
    /// Markdown file to read; standard input when omitted
    file: Option<PathBuf>,

    #[arg(short, long, value_enum, default_value = "html")]
    format: Format,

    /// JSON file with option flags
    #[arg(long)]
    options: Option<PathBuf>,

    /// Enable GitHub Flavored Markdown extensions
    #[arg(long)]
    gfm: bool,

    /// Enable every extension
    #[arg(long)]
    all: bool,

    #[arg(long)]
    no_autolink: bool,

    #[arg(long)]
    no_strikethrough: bool,

    #[arg(long)]
    no_table: bool,

    #[arg(long)]
    no_task_list: bool,

    /// Resolve inline content of blocks in parallel
    #[arg(long)]
    parallel: bool,
}

impl Cli {
    fn build_options(&self) -> Result<Options> {
        let mut options = match &self.options {
            Some(path) => {
                let text = read_source(Some(path))
                    .with_context(|| format!("reading options file {}", path.display()))?;
                serde_json::from_str(&text).map_err(Error::options)?
            }
            None if self.all => Options::all(),
            None if self.gfm => Options::gfm(),
            None => Options::default(),
        };
        if self.options.is_some() && self.gfm {
            options.gfm_autolink = true;
            options.gfm_strikethrough = true;
            options.gfm_table = true;
            options.gfm_task_list_item = true;
        }
        options.gfm_autolink &= !self.no_autolink;
        options.gfm_strikethrough &= !self.no_strikethrough;
        options.gfm_table &= !self.no_table;
        options.gfm_task_list_item &= !self.no_task_list;
        options.parallel_inlines |= self.parallel;
        Ok(options)
    }
}

/// Read a whole file, or standard input when no path is given
fn read_source(path: Option<&Path>) -> stratamark::Result<String> {
    let text = match path {
        Some(path) => std::fs::read_to_string(path)?,
        None => {
            let mut text = String::new();
            io::stdin().read_to_string(&mut text)?;
            text
        }
    };
    Ok(text)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let options = cli.build_options()?;
    debug!(?options, "options resolved");

    let input = read_source(cli.file.as_deref()).with_context(|| match &cli.file {
        Some(path) => format!("reading {}", path.display()),
        None => "reading standard input".to_string(),
    })?;

    let tree = Parser::new(options).parse(&input);
    match cli.format {
        Format::Html => print!("{}", HtmlRenderer::new().render(&tree)),
        Format::Json => println!("{}", json::to_json(&tree)?),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_an_io_error() {
        let err = read_source(Some(Path::new("no/such/file.md"))).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn reads_file_contents() {
        let path = std::env::temp_dir().join(format!("stratamark-{}.md", std::process::id()));
        std::fs::write(&path, "# hi\n").unwrap();
        let text = read_source(Some(&path)).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(text, "# hi\n");
    }
}
