//! Purpose: Hold top-level CLI command dispatch for `meshlib`.
//! Exports: `dispatch_command`.
//! Role: Keep `main.rs` focused on parse/bootstrap and delegate command execution.
//! Invariants: Every session opened here is closed before output is emitted.

use std::path::Path;

use meshlib::api::{FuncOutcome, Phys, Session, TextArgs};

use super::*;

pub(super) fn dispatch_command(command: Command, library_path: PathBuf) -> Result<RunOutcome, Error> {
    match command {
        Command::Completion { shell } => {
            let mut cmd = Cli::command();
            clap_complete::aot::generate(shell, &mut cmd, "meshlib", &mut io::stdout());
            Ok(RunOutcome::ok())
        }
        Command::Version => {
            emit_version_output();
            Ok(RunOutcome::ok())
        }
        Command::Doctor => {
            let session = Session::initialize(&library_path)?;
            let missing: Vec<&str> = session
                .missing_methods()
                .into_iter()
                .map(|method| method.name())
                .collect();
            let report = json!({
                "library": session.library_path(),
                "ok": missing.is_empty(),
                "missing_methods": missing,
            });
            session.close();
            emit_json(report);
            if missing.is_empty() {
                Ok(RunOutcome::ok())
            } else {
                Ok(RunOutcome::with_code(to_exit_code(ErrorKind::Contract)))
            }
        }
        Command::Mesh { setup, query } => {
            require_file(&setup.file, "mesh file")?;
            let mut session = Session::initialize(&library_path)?;
            session.mesh_init(&setup.to_setup())?;
            let value = run_mesh_query(&mut session, query)?;
            session.close();
            emit_json(value);
            Ok(RunOutcome::ok())
        }
        Command::Func {
            file,
            name,
            format,
            args,
        } => {
            require_file(&file, "function file")?;
            let format = format.unwrap_or_else(|| "d".repeat(args.len()));
            let mut session = Session::initialize(&library_path)?;
            session.func_init(&file)?;
            let outcome = session.func_call_format(&name, &format, &mut TextArgs::new(&args))?;
            session.close();
            let value = match outcome {
                FuncOutcome::Number(value) => json!({ "function": name, "value": value }),
                FuncOutcome::NotNumber { type_name } => json!({
                    "function": name,
                    "value": null,
                    "returned": type_name,
                }),
            };
            emit_json(value);
            Ok(RunOutcome::ok())
        }
    }
}

fn run_mesh_query(session: &mut Session, query: MeshQuery) -> Result<Value, Error> {
    match query {
        MeshQuery::Summary { phys } => {
            let phys = Phys::from(phys);
            Ok(json!({
                "phys": phys.to_raw(),
                "nnodes": session.nnodes(phys)?,
                "nels": session.nels(phys)?,
                "ntwins": session.ntwins()?,
            }))
        }
        MeshQuery::Node { index, phys } => {
            let phys = Phys::from(phys);
            let coords = session.node_coords(phys, index)?;
            Ok(json!({ "phys": phys.to_raw(), "node": index, "coords": coords.0 }))
        }
        MeshQuery::Element { index, phys } => {
            let phys = Phys::from(phys);
            let element = session.el_tet10(phys, index)?;
            Ok(json!({ "phys": phys.to_raw(), "element": index, "nodes": element.0 }))
        }
        MeshQuery::Twin { index } => {
            let pair = session.twin_pair(index)?;
            Ok(json!({ "twin": index, "first": pair.first, "second": pair.second }))
        }
        MeshQuery::Set {
            id,
            dom,
            index,
            phys,
        } => {
            let phys = Phys::from(phys);
            let dom = DomainKind::from(dom);
            let mut out = Map::new();
            out.insert("phys".to_string(), json!(phys.to_raw()));
            out.insert("dom".to_string(), json!(dom));
            out.insert("set".to_string(), json!(id));
            out.insert("nnodes".to_string(), json!(session.nnodes_set(phys, dom, id)?));
            if let Some(knode) = index {
                out.insert("index".to_string(), json!(knode));
                out.insert("node".to_string(), json!(session.node_set(phys, dom, id, knode)?));
            }
            Ok(Value::Object(out))
        }
    }
}

fn require_file(path: &Path, what: &str) -> Result<(), Error> {
    if path.is_file() {
        return Ok(());
    }
    Err(Error::new(ErrorKind::NotFound)
        .with_message(format!("{what} not found"))
        .with_path(path)
        .with_hint("Paths are resolved against the current directory."))
}
