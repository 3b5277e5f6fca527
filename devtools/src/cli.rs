// CLI argument parsing and definitions

use clap::Parser;
use std::path::PathBuf;

use devtools_archive::DEFAULT_OUTPUT;

#[derive(Debug, Clone, Parser)]
#[command(name = "devtools")]
#[command(about = "Package a plugin source folder into a PHAR archive")]
#[command(version)]
pub struct Args {
    /// Plugin source folder containing plugin.yml
    #[arg(long, value_name = "sourceFolder")]
    pub make: Option<PathBuf>,

    /// Folder that archive paths are made relative to (defaults to the source folder)
    #[arg(long, value_name = "relativePath")]
    pub relative: Option<PathBuf>,

    /// Archive to write
    #[arg(long, value_name = "pharName.phar", default_value = DEFAULT_OUTPUT)]
    pub out: PathBuf,

    /// Archive path of the script the stub should run
    #[arg(long, value_name = "relativeSourcePath.php")]
    pub entry: Option<String>,

    /// Compress every archive entry
    #[arg(long)]
    pub compress: bool,

    /// Path to a builder configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Skip downloading depend/softdepend plugins
    #[arg(long)]
    pub no_fetch: bool,

    /// Hide the file progress indicator
    #[arg(short, long)]
    pub quiet: bool,

    /// Enable debug output
    #[arg(short, long)]
    pub debug: bool,

    /// Print the metadata and entries of an existing archive
    #[arg(long, value_name = "archive", conflicts_with = "make")]
    pub inspect: Option<PathBuf>,
}
