//! Purpose: `meshlib` CLI entry point for querying a Lua mesh library.
//! Role: Binary crate root; parses args, runs one session per command, emits JSON on stdout.
//! Invariants: Each command opens and closes its own session.
//! Invariants: Errors go to stderr (text on a terminal, JSON otherwise).
//! Invariants: Process exit code is derived from `api::to_exit_code`.
use std::io::{self, IsTerminal};
use std::path::PathBuf;

use clap::{
    Args, CommandFactory, Parser, Subcommand, ValueEnum, ValueHint,
    error::ErrorKind as ClapErrorKind,
};
use clap_complete::aot::Shell;
use serde_json::{Map, Value, json};

mod command_dispatch;

use meshlib::api::{
    DomainKind, Error, ErrorKind, MESH_NOPART, MeshSetup, default_library_path, to_exit_code,
};

#[derive(Copy, Clone, Debug)]
struct RunOutcome {
    exit_code: i32,
}

impl RunOutcome {
    fn ok() -> Self {
        Self { exit_code: 0 }
    }

    fn with_code(exit_code: i32) -> Self {
        Self { exit_code }
    }
}

fn main() {
    meshlib::logging::init_tracing();
    let exit_code = match run() {
        Ok(outcome) => outcome.exit_code,
        Err(err) => {
            emit_error(&err);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn run() -> Result<RunOutcome, Error> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ClapErrorKind::DisplayHelp
            | ClapErrorKind::DisplayVersion
            | ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                err.print().map_err(|io_err| {
                    Error::new(ErrorKind::Io)
                        .with_message("failed to write help")
                        .with_source(io_err)
                })?;
                let exit_code = if matches!(
                    err.kind(),
                    ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
                ) {
                    2
                } else {
                    0
                };
                return Ok(RunOutcome::with_code(exit_code));
            }
            _ => {
                return Err(Error::new(ErrorKind::Usage)
                    .with_message(clap_error_summary(&err))
                    .with_hint("Run `meshlib --help` for usage."));
            }
        },
    };

    let library_path = cli.lib.unwrap_or_else(default_library_path);
    command_dispatch::dispatch_command(cli.command, library_path)
}

#[derive(Parser)]
#[command(
    name = "meshlib",
    version,
    about = "Query finite-element meshes through an embedded Lua mesh library",
    long_about = None,
    after_help = r#"EXAMPLES
  $ meshlib --lib /opt/fem doctor
  $ meshlib mesh fclad.msh --outer-radius 1.0 --inner-radius 1.1 \
      --phys-pellet 1 --phys-clad 2 --phys-surf-pellet 5 --phys-surf-clad 11 summary --phys 2
  $ meshlib mesh fclad.msh node 116
  $ meshlib func demo3.lua f2 --format id 3 10.5"#,
    arg_required_else_help = true
)]
struct Cli {
    #[arg(
        long,
        help = "Directory containing meshlib/cstart.lua (default: $MESHLIB_PATH, else .)",
        value_hint = ValueHint::DirPath
    )]
    lib: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    #[command(
        about = "Check that the mesh library loads and defines every method",
        after_help = r#"NOTES
  - Exits nonzero when a contract method is missing."#
    )]
    Doctor,
    #[command(
        arg_required_else_help = true,
        about = "Initialize a mesh and run one query against it"
    )]
    Mesh {
        #[command(flatten)]
        setup: SetupArgs,
        #[command(subcommand)]
        query: MeshQuery,
    },
    #[command(
        arg_required_else_help = true,
        about = "Load a field-function script and call one function",
        after_help = r#"NOTES
  - --format has one character per argument: i (integer), d (float), c (string).
  - Other characters are skipped and consume no argument.
  - Without --format every argument is passed as a float."#
    )]
    Func {
        #[arg(help = "Field-function script", value_hint = ValueHint::FilePath)]
        file: PathBuf,
        #[arg(help = "Function name")]
        name: String,
        #[arg(long, help = "Argument types, e.g. `id` or `i_d`")]
        format: Option<String>,
        #[arg(help = "Function arguments", allow_hyphen_values = true)]
        args: Vec<String>,
    },
    #[command(about = "Print version info as JSON")]
    Version,
    #[command(arg_required_else_help = true, about = "Generate shell completions")]
    Completion {
        #[arg(help = "Shell to generate completions for")]
        shell: Shell,
    },
}

#[derive(Args)]
struct SetupArgs {
    #[arg(help = "Mesh file passed to the library's init method", value_hint = ValueHint::FilePath)]
    file: PathBuf,
    #[arg(long, default_value_t = 0.0, help = "Pellet outer radius")]
    outer_radius: f64,
    #[arg(long, default_value_t = 0.0, help = "Clad inner radius")]
    inner_radius: f64,
    #[arg(long, default_value_t = MESH_NOPART, allow_negative_numbers = true)]
    phys_pellet: i32,
    #[arg(long, default_value_t = MESH_NOPART, allow_negative_numbers = true)]
    phys_clad: i32,
    #[arg(long, default_value_t = MESH_NOPART, allow_negative_numbers = true)]
    phys_surf_pellet: i32,
    #[arg(long, default_value_t = MESH_NOPART, allow_negative_numbers = true)]
    phys_surf_clad: i32,
}

impl SetupArgs {
    fn to_setup(&self) -> MeshSetup {
        MeshSetup::new(&self.file)
            .with_radii(self.outer_radius, self.inner_radius)
            .with_volumes(self.phys_pellet, self.phys_clad)
            .with_surfaces(self.phys_surf_pellet, self.phys_surf_clad)
    }
}

#[derive(Subcommand)]
enum MeshQuery {
    #[command(about = "Node, element, and twin counts")]
    Summary {
        #[arg(long, allow_negative_numbers = true, help = "Physical group (default: whole mesh)")]
        phys: Option<i32>,
    },
    #[command(about = "Coordinates of one node (1-based)")]
    Node {
        index: i64,
        #[arg(long, allow_negative_numbers = true, help = "Physical group (default: whole mesh)")]
        phys: Option<i32>,
    },
    #[command(about = "Tet10 connectivity of one element (1-based)")]
    Element {
        index: i64,
        #[arg(long, allow_negative_numbers = true, help = "Physical group (default: whole mesh)")]
        phys: Option<i32>,
    },
    #[command(about = "Node pair of one twin (1-based)")]
    Twin { index: i64 },
    #[command(about = "Size of a node set, or one of its nodes with --index")]
    Set {
        #[arg(help = "Set id")]
        id: i64,
        #[arg(long, value_enum)]
        dom: DomArg,
        #[arg(long, help = "1-based position within the set")]
        index: Option<i64>,
        #[arg(long, allow_negative_numbers = true, help = "Physical group (default: whole mesh)")]
        phys: Option<i32>,
    },
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum DomArg {
    Surf,
    Vol,
}

impl From<DomArg> for DomainKind {
    fn from(value: DomArg) -> Self {
        match value {
            DomArg::Surf => DomainKind::Surface,
            DomArg::Vol => DomainKind::Volume,
        }
    }
}

fn clap_error_summary(err: &clap::Error) -> String {
    let rendered = err.render().to_string();
    let line = rendered.lines().next().unwrap_or("invalid arguments");
    line.trim_start_matches("error: ").trim().to_string()
}

fn emit_version_output() {
    if io::stdout().is_terminal() {
        println!("meshlib {}", env!("CARGO_PKG_VERSION"));
    } else {
        emit_json(json!({
            "name": "meshlib",
            "version": env!("CARGO_PKG_VERSION"),
        }));
    }
}

fn emit_json(value: Value) {
    let json = if io::stdout().is_terminal() {
        serde_json::to_string_pretty(&value)
    } else {
        serde_json::to_string(&value)
    }
    .unwrap_or_else(|_| "{\"error\":\"json encode failed\"}".to_string());
    println!("{json}");
}

fn emit_error(err: &Error) {
    if io::stderr().is_terminal() {
        eprintln!("{}", error_text(err));
        return;
    }
    let json = serde_json::to_string(&error_json(err)).unwrap_or_else(|_| {
        "{\"error\":{\"kind\":\"Internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

fn error_message(err: &Error) -> String {
    err.message()
        .map(str::to_string)
        .unwrap_or_else(|| format!("{:?}", err.kind()))
}

fn error_json(err: &Error) -> Value {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!(format!("{:?}", err.kind())));
    inner.insert("message".to_string(), json!(error_message(err)));
    if let Some(method) = err.method() {
        inner.insert("method".to_string(), json!(method));
    }
    if let Some(hint) = err.hint() {
        inner.insert("hint".to_string(), json!(hint));
    }
    if let Some(path) = err.path() {
        inner.insert("path".to_string(), json!(path.display().to_string()));
    }

    let mut outer = Map::new();
    outer.insert("error".to_string(), Value::Object(inner));
    Value::Object(outer)
}

fn error_text(err: &Error) -> String {
    let mut lines = vec![format!("error: {}", error_message(err))];
    if let Some(method) = err.method() {
        lines.push(format!("method: {method}"));
    }
    if let Some(hint) = err.hint() {
        lines.push(format!("hint: {hint}"));
    }
    if let Some(path) = err.path() {
        lines.push(format!("path: {}", path.display()));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::{Cli, Command, MeshQuery, error_json, error_text};
    use clap::Parser;
    use meshlib::api::{Error, ErrorKind, Phys};

    #[test]
    fn mesh_setup_defaults_to_unpartitioned() {
        let cli = Cli::try_parse_from(["meshlib", "mesh", "fclad.msh", "summary"]).expect("parse");
        match cli.command {
            Command::Mesh { setup, query } => {
                let setup = setup.to_setup();
                assert_eq!(setup.phys_pellet, Phys::All);
                assert_eq!(setup.phys_surf_clad, Phys::All);
                assert!(matches!(query, MeshQuery::Summary { phys: None }));
            }
            _ => panic!("expected mesh command"),
        }
    }

    #[test]
    fn negative_group_ids_parse() {
        let cli = Cli::try_parse_from([
            "meshlib",
            "mesh",
            "fclad.msh",
            "--phys-clad",
            "-1",
            "node",
            "116",
            "--phys",
            "-1",
        ])
        .expect("parse");
        match cli.command {
            Command::Mesh { setup, query } => {
                assert_eq!(setup.phys_clad, -1);
                assert!(matches!(
                    query,
                    MeshQuery::Node {
                        index: 116,
                        phys: Some(-1)
                    }
                ));
            }
            _ => panic!("expected mesh command"),
        }
    }

    #[test]
    fn func_args_accept_negative_values() {
        let cli = Cli::try_parse_from(["meshlib", "func", "demo3.lua", "f3", "--format", "i_d", "-2", "2.0"])
            .expect("parse");
        match cli.command {
            Command::Func { format, args, .. } => {
                assert_eq!(format.as_deref(), Some("i_d"));
                assert_eq!(args, ["-2", "2.0"]);
            }
            _ => panic!("expected func command"),
        }
    }

    #[test]
    fn error_json_carries_method() {
        let err = Error::new(ErrorKind::Script)
            .with_message("boom")
            .with_method("nels");
        let value = error_json(&err);
        assert_eq!(value["error"]["kind"], "Script");
        assert_eq!(value["error"]["method"], "nels");
        assert!(error_text(&err).contains("method: nels"));
    }
}
