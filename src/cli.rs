use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use tracing::Level;

#[derive(Parser, Debug)]
#[command(name = "storezip")]
#[command(version)]
#[command(about = "Create, list and test uncompressed ZIP archives", long_about = None)]
#[command(after_help = "Examples:\n  \
  storezip create -o site.zip index.html img.png    store two files in site.zip\n  \
  storezip create -o out.zip -j build/app.js        store build/app.js as app.js\n  \
  storezip test site.zip                             check every entry's CRC-32")]
pub struct Cli {
    /// Set the logging level
    #[arg(long, value_enum, global = true, default_value = "warn")]
    pub log_level: LogLevel,

    /// Quiet mode (-qq => quieter)
    #[arg(short = 'q', global = true, action = clap::ArgAction::Count)]
    pub quiet: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Store files in a new archive
    Create(CreateArgs),

    /// List archive contents
    List {
        /// ZIP file path
        #[arg(value_name = "ZIP")]
        archive: PathBuf,

        /// Show sizes, checksums and dates
        #[arg(short = 'v')]
        verbose: bool,
    },

    /// Check the CRC-32 of every entry
    Test {
        /// ZIP file path
        #[arg(value_name = "ZIP")]
        archive: PathBuf,
    },
}

#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Archive to write
    #[arg(short = 'o', long, value_name = "ZIP")]
    pub output: PathBuf,

    /// Files to store, in archive order
    #[arg(value_name = "FILES", required = true)]
    pub files: Vec<PathBuf>,

    /// Entry name for the file at the same position (repeatable)
    #[arg(long = "name", value_name = "NAME")]
    pub names: Vec<String>,

    /// Junk paths (store only the file name)
    #[arg(short = 'j')]
    pub junk_paths: bool,

    /// Overwrite the output archive if it exists
    #[arg(short = 'f', long)]
    pub force: bool,
}

impl CreateArgs {
    /// Raw entry name for the file at `index`.
    ///
    /// Explicit `--name` values win; otherwise the path as given, with
    /// backslashes turned into forward slashes and any leading `./` removed.
    /// Non-UTF-8 paths are passed through as bytes and rejected by the
    /// archive builder.
    pub fn entry_name(&self, index: usize, path: &Path) -> Vec<u8> {
        if let Some(name) = self.names.get(index) {
            return name.as_bytes().to_vec();
        }

        let source = if self.junk_paths {
            path.file_name().unwrap_or(path.as_os_str())
        } else {
            path.as_os_str()
        };

        let mut name: Vec<u8> = source
            .as_encoded_bytes()
            .iter()
            .map(|&b| if b == b'\\' { b'/' } else { b })
            .collect();
        while name.starts_with(b"./") {
            name.drain(..2);
        }
        name
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

impl Cli {
    pub fn is_quiet(&self) -> bool {
        self.quiet > 0
    }

    pub fn is_very_quiet(&self) -> bool {
        self.quiet > 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_args(argv: &[&str]) -> CreateArgs {
        let cli = Cli::try_parse_from(argv).unwrap();
        match cli.command {
            Command::Create(args) => args,
            other => panic!("expected create, got {other:?}"),
        }
    }

    #[test]
    fn test_entry_names_from_paths() {
        let args = create_args(&["storezip", "create", "-o", "out.zip", "./a.txt", "dir\\b.txt"]);
        assert_eq!(args.entry_name(0, &args.files[0]), b"a.txt");
        assert_eq!(args.entry_name(1, &args.files[1]), b"dir/b.txt");
    }

    #[test]
    fn test_entry_names_junk_paths() {
        let args = create_args(&["storezip", "create", "-j", "-o", "out.zip", "build/js/app.js"]);
        assert_eq!(args.entry_name(0, &args.files[0]), b"app.js");
    }

    #[test]
    fn test_explicit_names_win() {
        let args = create_args(&[
            "storezip", "create", "-o", "out.zip", "--name", "index.html", "tmp/page.html",
            "img.png",
        ]);
        assert_eq!(args.entry_name(0, &args.files[0]), b"index.html");
        assert_eq!(args.entry_name(1, &args.files[1]), b"img.png");
    }

    #[test]
    fn test_global_flags() {
        let cli = Cli::try_parse_from(["storezip", "test", "a.zip", "-qq", "--log-level", "debug"])
            .unwrap();
        assert!(cli.is_very_quiet());
        assert_eq!(Level::from(cli.log_level), Level::DEBUG);
    }

    #[test]
    fn test_create_requires_files() {
        assert!(Cli::try_parse_from(["storezip", "create", "-o", "out.zip"]).is_err());
    }
}
