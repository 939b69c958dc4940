//! Command-line surface of both tools and where their outputs go.

use std::path::{Path, PathBuf};

use clap::{ArgAction, Args, Parser};
use tracing_subscriber::EnvFilter;

use crate::writer::c::{c_identifier, sanitize_level_name, symbol_safe};

/// Output roots shared by both tools.
#[derive(Args, Debug, Clone)]
pub struct Roots {
    /// Root for generated sources, headers and binaries
    #[arg(long, env = "ASSETC_GEN_ROOT", default_value = "gen")]
    pub gen_root: PathBuf,
    /// Root for .sym and .json debug outputs
    #[arg(long, env = "ASSETC_ANALYSIS_ROOT", default_value = "analysis")]
    pub analysis_root: PathBuf,
}

#[derive(Parser, Debug)]
#[command(name = "levelc", author, version, about = "Compile LVLTEXT levels into LVL1 blobs")]
pub struct LevelcCli {
    /// Input LVLTEXT file (.lvl)
    pub input: PathBuf,
    /// Output binary (.bin)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
    #[command(flatten)]
    pub roots: Roots,
    /// Directory for .bin blobs [default: <gen>/assets/levels]
    #[arg(long)]
    pub out_assets: Option<PathBuf>,
    /// Directory for generated .c files [default: <gen>/src/levels]
    #[arg(long)]
    pub out_src: Option<PathBuf>,
    /// Directory for generated headers [default: <gen>/include/levels]
    #[arg(long)]
    pub out_include: Option<PathBuf>,
    /// Directory for .sym and .json [default: <analysis>/levels]
    #[arg(long)]
    pub out_debug: Option<PathBuf>,
    /// Generated ids header (.h)
    #[arg(long)]
    pub ids: Option<PathBuf>,
    /// Symbol map (.sym)
    #[arg(long)]
    pub sym: Option<PathBuf>,
    /// Debug dump (.json)
    #[arg(long)]
    pub json: Option<PathBuf>,
    /// C file embedding the blob (.c)
    #[arg(long)]
    pub blob_c: Option<PathBuf>,
    /// Header declaring the blob (.h)
    #[arg(long)]
    pub blob_h: Option<PathBuf>,
    /// C array name for the blob [default: <level>_blob]
    #[arg(long)]
    pub blob_name: Option<String>,
    /// Also write level_format.h (constants and accessors) here
    #[arg(long)]
    pub format_h: Option<PathBuf>,
    /// More logging (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Parser, Debug)]
#[command(name = "tilesetc", author, version, about = "Compile TSET tilesets into binary blobs")]
pub struct TilesetcCli {
    /// Input tileset file (.tset)
    pub input: PathBuf,
    /// Output binary (.bin)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
    #[command(flatten)]
    pub roots: Roots,
    /// Generated tile ids header (*_tset_ids.h)
    #[arg(long)]
    pub ids: Option<PathBuf>,
    /// Symbol map (.sym)
    #[arg(long)]
    pub sym: Option<PathBuf>,
    /// Debug dump (.json)
    #[arg(long)]
    pub json: Option<PathBuf>,
    /// Skip the .sym output
    #[arg(long)]
    pub no_sym: bool,
    /// Skip the .json output
    #[arg(long)]
    pub no_json: bool,
    /// Header declaring the blob (*_tset-blob.h)
    #[arg(long)]
    pub blob_h: Option<PathBuf>,
    /// C file embedding the blob (*_tset.c)
    #[arg(long)]
    pub blob_c: Option<PathBuf>,
    /// Header declaring the charset (*_charset-blob.h)
    #[arg(long)]
    pub charset_h: Option<PathBuf>,
    /// C file embedding the charset (*_charset.c)
    #[arg(long)]
    pub charset_c: Option<PathBuf>,
    /// More logging (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

/// Installs the stderr subscriber. `RUST_LOG` wins over `-v`.
pub fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn resolve(explicit: Option<&PathBuf>, default: impl FnOnce() -> PathBuf) -> PathBuf {
    let path = explicit.cloned().unwrap_or_else(default);
    std::path::absolute(&path).unwrap_or(path)
}

/// Every artifact path of one `levelc` run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelOutputs {
    pub bin: PathBuf,
    pub ids: PathBuf,
    pub sym: PathBuf,
    pub json: PathBuf,
    pub blob_c: PathBuf,
    pub blob_h: PathBuf,
    pub format_h: Option<PathBuf>,
    pub blob_name: String,
}

impl LevelcCli {
    pub fn outputs(&self, level_name: &str) -> LevelOutputs {
        let base = sanitize_level_name(level_name);
        let gen_dir = |kind: &str| self.roots.gen_root.join(kind).join("levels");
        let assets = self.out_assets.clone().unwrap_or_else(|| gen_dir("assets"));
        let src = self.out_src.clone().unwrap_or_else(|| gen_dir("src"));
        let include = self.out_include.clone().unwrap_or_else(|| gen_dir("include"));
        let debug = self
            .out_debug
            .clone()
            .unwrap_or_else(|| self.roots.analysis_root.join("levels"));

        LevelOutputs {
            bin: resolve(self.output.as_ref(), || assets.join(format!("{base}.bin"))),
            ids: resolve(self.ids.as_ref(), || include.join(format!("{base}.h"))),
            sym: resolve(self.sym.as_ref(), || debug.join(format!("{base}.sym"))),
            json: resolve(self.json.as_ref(), || debug.join(format!("{base}.json"))),
            blob_c: resolve(self.blob_c.as_ref(), || src.join(format!("{base}.c"))),
            blob_h: resolve(self.blob_h.as_ref(), || include.join(format!("{base}-blob.h"))),
            format_h: self
                .format_h
                .as_ref()
                .map(|p| std::path::absolute(p).unwrap_or_else(|_| p.clone())),
            blob_name: self
                .blob_name
                .clone()
                .unwrap_or_else(|| format!("{}_blob", c_identifier(&base))),
        }
    }
}

/// Every artifact path of one `tilesetc` run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TilesetOutputs {
    pub bin: PathBuf,
    pub ids: PathBuf,
    pub blob_h: PathBuf,
    pub blob_c: PathBuf,
    /// Only when the tileset declares a charset.
    pub charset: Option<(PathBuf, PathBuf)>,
    pub sym: Option<PathBuf>,
    pub json: Option<PathBuf>,
    /// Prefix of the generated C arrays.
    pub symbol: String,
}

impl TilesetcCli {
    pub fn outputs(&self, name: &str, has_charset: bool) -> TilesetOutputs {
        let gen_root: &Path = &self.roots.gen_root;
        let analysis = self.roots.analysis_root.join("tilesets");
        let include = gen_root.join("include");
        let src = gen_root.join("src").join("tilesets");

        let charset = has_charset.then(|| {
            (
                resolve(self.charset_h.as_ref(), || {
                    include.join("tilesets").join(format!("{name}_charset-blob.h"))
                }),
                resolve(self.charset_c.as_ref(), || src.join(format!("{name}_charset.c"))),
            )
        });

        TilesetOutputs {
            bin: resolve(self.output.as_ref(), || {
                gen_root.join("assets").join(format!("{name}.bin"))
            }),
            ids: resolve(self.ids.as_ref(), || include.join(format!("{name}_tset_ids.h"))),
            blob_h: resolve(self.blob_h.as_ref(), || {
                include.join("tilesets").join(format!("{name}_tset-blob.h"))
            }),
            blob_c: resolve(self.blob_c.as_ref(), || src.join(format!("{name}_tset.c"))),
            charset,
            sym: (!self.no_sym)
                .then(|| resolve(self.sym.as_ref(), || analysis.join(format!("{name}.sym")))),
            json: (!self.no_json)
                .then(|| resolve(self.json.as_ref(), || analysis.join(format!("{name}.json")))),
            symbol: symbol_safe(name),
        }
    }
}
