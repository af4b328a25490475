//! Purpose: C ABI bridge for native callers (libmeshlib).
//! Exports: `meshlib_init`, `meshlib_close`, the `mesh_*` query functions, `mesh_arg`.
//! Role: Stable ABI surface matching `include/meshlib.h`.
//! Invariants: One process-wide session behind a mutex; one invocation at a time.
//! Invariants: Status 0 is success; other values come from `to_exit_code`.
//! Invariants: Outputs are written only on success; contract violations abort the process.
#![allow(non_camel_case_types)]

use crate::core::bridge::Session;
use crate::core::error::{Error, ErrorKind, to_exit_code};
use crate::core::func::{ArgSource, FuncOutcome, too_few};
use crate::core::marshal::{Arg, ArgTag, Method};
use crate::core::query::{DomainKind, MeshSetup, Phys};
use libc::{c_char, c_double, c_int};
use std::ffi::CStr;
use std::sync::{Mutex, MutexGuard};

pub const MESH_NOPART: c_int = crate::core::query::MESH_NOPART;
pub const MESH_SURF: c_int = 1;
pub const MESH_VOL: c_int = 2;

/// One field-function argument; the format character selects the member.
#[repr(C)]
#[derive(Clone, Copy)]
pub union mesh_arg {
    pub i: c_int,
    pub d: c_double,
    pub c: *const c_char,
}

static SESSION: Mutex<Option<Session>> = Mutex::new(None);

#[unsafe(no_mangle)]
pub extern "C" fn meshlib_init(libpath: *const c_char) -> c_int {
    crate::logging::init_tracing();
    status(open_session(libpath))
}

#[unsafe(no_mangle)]
pub extern "C" fn meshlib_close() {
    if let Some(session) = lock_session().take() {
        session.close();
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn mesh_init(
    mesh_file_name: *const c_char,
    rf_ex: c_double,
    rcl_in: c_double,
    phys_pel: c_int,
    phys_clad: c_int,
    phys_surf_pel: c_int,
    phys_surf_clad: c_int,
) -> c_int {
    let file = match parse_cstr(mesh_file_name, "mesh_file_name") {
        Ok(file) => file,
        Err(err) => return status(Err(err)),
    };
    let setup = MeshSetup::new(file)
        .with_radii(rf_ex, rcl_in)
        .with_volumes(phys_pel, phys_clad)
        .with_surfaces(phys_surf_pel, phys_surf_clad);
    status(with_session(|session| session.mesh_init(&setup)))
}

#[unsafe(no_mangle)]
pub extern "C" fn mesh_nnodes(phys: c_int, nnodes: *mut c_int) -> c_int {
    status(with_session(|session| {
        check_out(nnodes, "nnodes")?;
        let count = narrow(session.nnodes(Phys::from(phys))?, Method::Nnodes)?;
        unsafe { *nnodes = count };
        Ok(())
    }))
}

#[unsafe(no_mangle)]
pub extern "C" fn mesh_node_coords(phys: c_int, node: c_int, coord: *mut c_double) -> c_int {
    status(with_session(|session| {
        check_out(coord, "coord")?;
        let coords = session.node_coords(Phys::from(phys), i64::from(node))?;
        let out = unsafe { std::slice::from_raw_parts_mut(coord, 3) };
        out.copy_from_slice(&coords.0);
        Ok(())
    }))
}

#[unsafe(no_mangle)]
pub extern "C" fn mesh_ntwins(ntwins: *mut c_int) -> c_int {
    status(with_session(|session| {
        check_out(ntwins, "ntwins")?;
        let count = narrow(session.ntwins()?, Method::Ntwins)?;
        unsafe { *ntwins = count };
        Ok(())
    }))
}

#[unsafe(no_mangle)]
pub extern "C" fn mesh_twin_pair(ktwin: c_int, ktwin1: *mut c_int, ktwin2: *mut c_int) -> c_int {
    status(with_session(|session| {
        check_out(ktwin1, "ktwin1")?;
        check_out(ktwin2, "ktwin2")?;
        let pair = session.twin_pair(i64::from(ktwin))?;
        let first = narrow(pair.first, Method::TwinPair)?;
        let second = narrow(pair.second, Method::TwinPair)?;
        unsafe {
            *ktwin1 = first;
            *ktwin2 = second;
        }
        Ok(())
    }))
}

#[unsafe(no_mangle)]
pub extern "C" fn mesh_nnodes_set(
    phys: c_int,
    dom_kind: c_int,
    id_set: c_int,
    nnodes: *mut c_int,
) -> c_int {
    status(with_session(|session| {
        check_out(nnodes, "nnodes")?;
        let dom = parse_dom(dom_kind)?;
        let count = session.nnodes_set(Phys::from(phys), dom, i64::from(id_set))?;
        let count = narrow(count, Method::NnodesSet)?;
        unsafe { *nnodes = count };
        Ok(())
    }))
}

#[unsafe(no_mangle)]
pub extern "C" fn mesh_node_set(
    phys: c_int,
    dom_kind: c_int,
    id_set: c_int,
    knode: c_int,
    nnode: *mut c_int,
) -> c_int {
    status(with_session(|session| {
        check_out(nnode, "nnode")?;
        let dom = parse_dom(dom_kind)?;
        let node = session.node_set(
            Phys::from(phys),
            dom,
            i64::from(id_set),
            i64::from(knode),
        )?;
        let node = narrow(node, Method::NodeSet)?;
        unsafe { *nnode = node };
        Ok(())
    }))
}

#[unsafe(no_mangle)]
pub extern "C" fn mesh_nels(phys: c_int, nels: *mut c_int) -> c_int {
    status(with_session(|session| {
        check_out(nels, "nels")?;
        let count = narrow(session.nels(Phys::from(phys))?, Method::Nels)?;
        unsafe { *nels = count };
        Ok(())
    }))
}

#[unsafe(no_mangle)]
pub extern "C" fn mesh_el_tet10(phys: c_int, kel: c_int, nodes: *mut c_int) -> c_int {
    status(with_session(|session| {
        check_out(nodes, "nodes")?;
        let element = session.el_tet10(Phys::from(phys), i64::from(kel))?;
        let mut narrowed = [0 as c_int; 10];
        for (slot, node) in narrowed.iter_mut().zip(element.0) {
            *slot = narrow(node, Method::ElTet10)?;
        }
        let out = unsafe { std::slice::from_raw_parts_mut(nodes, 10) };
        out.copy_from_slice(&narrowed);
        Ok(())
    }))
}

#[unsafe(no_mangle)]
pub extern "C" fn mesh_func_init(func_file_name: *const c_char) -> c_int {
    let file = match parse_cstr(func_file_name, "func_file_name") {
        Ok(file) => file,
        Err(err) => return status(Err(err)),
    };
    status(with_session(|session| session.func_init(file)))
}

/// Calls a field function. `params` holds one format character per argument
/// (`i`, `d`, `c`); other characters are skipped without consuming an entry of
/// `args`. A non-numeric return stores NaN in `res` and still returns 0.
#[unsafe(no_mangle)]
pub extern "C" fn mesh_func_call(
    func_name: *const c_char,
    params: *const c_char,
    res: *mut c_double,
    args: *const mesh_arg,
    nargs: usize,
) -> c_int {
    status(with_session(|session| {
        let name = parse_cstr(func_name, "func_name")?;
        let format = parse_cstr(params, "params")?;
        check_out(res, "res")?;
        let args = if nargs == 0 {
            &[][..]
        } else if args.is_null() {
            return Err(Error::new(ErrorKind::Usage).with_message("args is null"));
        } else {
            unsafe { std::slice::from_raw_parts(args, nargs) }
        };
        let mut source = UnionArgs { args: args.iter() };
        let outcome = session.func_call_format(name, format, &mut source)?;
        let value = match outcome {
            FuncOutcome::Number(value) => value,
            FuncOutcome::NotNumber { .. } => f64::NAN,
        };
        unsafe { *res = value };
        Ok(())
    }))
}

struct UnionArgs<'a> {
    args: std::slice::Iter<'a, mesh_arg>,
}

impl ArgSource for UnionArgs<'_> {
    fn take(&mut self, tag: ArgTag) -> Result<Arg, Error> {
        let arg = self.args.next().ok_or_else(|| too_few(tag))?;
        match tag {
            ArgTag::Int => Ok(Arg::Int(i64::from(unsafe { arg.i }))),
            ArgTag::Float => Ok(Arg::Float(unsafe { arg.d })),
            ArgTag::Str => parse_cstr(unsafe { arg.c }, "string argument").map(Arg::from),
        }
    }
}

fn open_session(libpath: *const c_char) -> Result<(), Error> {
    let libpath = parse_cstr(libpath, "libpath")?;
    let mut guard = lock_session();
    if guard.is_some() {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("a mesh library session is already open")
            .with_hint("Call meshlib_close before initializing again."));
    }
    *guard = Some(Session::initialize(libpath)?);
    Ok(())
}

fn lock_session() -> MutexGuard<'static, Option<Session>> {
    SESSION
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn with_session<T, F>(op: F) -> Result<T, Error>
where
    F: FnOnce(&mut Session) -> Result<T, Error>,
{
    let mut guard = lock_session();
    let session = guard.as_mut().ok_or_else(|| {
        Error::new(ErrorKind::Usage)
            .with_message("no mesh library session is open")
            .with_hint("Call meshlib_init first.")
    })?;
    op(session)
}

fn status(result: Result<(), Error>) -> c_int {
    match result {
        Ok(()) => 0,
        Err(err) if err.is_fatal() => fatal(&err),
        Err(err) => {
            // The only error-level report of a failed call.
            tracing::error!(error = %err, hint = err.hint().unwrap_or_default(), "mesh call failed");
            to_exit_code(err.kind())
        }
    }
}

fn fatal(err: &Error) -> ! {
    tracing::error!(
        error = %err,
        hint = err.hint().unwrap_or_default(),
        "mesh library contract violated; aborting"
    );
    std::process::abort()
}

fn check_out<T>(out: *mut T, name: &str) -> Result<(), Error> {
    if out.is_null() {
        return Err(Error::new(ErrorKind::Usage).with_message(format!("{name} is null")));
    }
    Ok(())
}

fn narrow(value: i64, method: Method) -> Result<c_int, Error> {
    c_int::try_from(value).map_err(|_| {
        Error::new(ErrorKind::Contract)
            .with_message(format!("result {value} does not fit in a C int"))
            .with_method(method.name())
    })
}

fn parse_dom(raw: c_int) -> Result<DomainKind, Error> {
    DomainKind::from_raw(raw).ok_or_else(|| {
        Error::new(ErrorKind::Usage)
            .with_message(format!("invalid domain kind {raw}"))
            .with_hint("Use MESH_surf (1) or MESH_vol (2).")
    })
}

fn parse_cstr<'a>(input: *const c_char, name: &str) -> Result<&'a str, Error> {
    if input.is_null() {
        return Err(Error::new(ErrorKind::Usage).with_message(format!("{name} is null")));
    }
    unsafe { CStr::from_ptr(input) }
        .to_str()
        .map_err(|err| {
            Error::new(ErrorKind::Usage)
                .with_message(format!("{name} is not valid UTF-8"))
                .with_source(err)
        })
}
