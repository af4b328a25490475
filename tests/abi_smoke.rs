//! Purpose: Drive the C ABI end to end the way a native caller would.
//! Exports: Integration tests only.
//! Role: Cover the process-wide session, status codes, and output arguments.
//! Invariants: Kept to one test so the process-wide session is never shared across threads.
use std::ffi::CString;

use libc::{c_double, c_int};
use meshlib::abi::{
    MESH_NOPART, MESH_SURF, MESH_VOL, mesh_arg, mesh_el_tet10, mesh_func_call, mesh_func_init,
    mesh_init, mesh_nels, mesh_nnodes, mesh_nnodes_set, mesh_node_coords, mesh_node_set,
    mesh_ntwins, mesh_twin_pair, meshlib_close, meshlib_init,
};

const LIB: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures");
const MESH: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/tiny_mesh.lua");
const FUNCS: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/demo3.lua");

fn cstr(value: &str) -> CString {
    CString::new(value).expect("cstring")
}

fn call(name: &CString, params: &str, args: &[mesh_arg]) -> (c_int, c_double) {
    let params = cstr(params);
    let mut res: c_double = -1.0;
    let rc = mesh_func_call(name.as_ptr(), params.as_ptr(), &mut res, args.as_ptr(), args.len());
    (rc, res)
}

#[test]
fn abi_session_lifecycle() {
    let lib = cstr(LIB);
    let mesh = cstr(MESH);
    let funcs = cstr(FUNCS);

    let mut count: c_int = 0;
    assert_eq!(mesh_nnodes(MESH_NOPART, &mut count), 2, "query before init");

    let missing = cstr("/nonexistent/lib");
    assert_eq!(meshlib_init(missing.as_ptr()), 4, "missing bootstrap");

    for _ in 0..2 {
        assert_eq!(meshlib_init(lib.as_ptr()), 0);
        assert_eq!(meshlib_init(lib.as_ptr()), 2, "second init while open");
        assert_eq!(mesh_init(mesh.as_ptr(), 1.0, 1.1, 1, 2, 5, 11), 0);

        assert_eq!(mesh_nnodes(2, &mut count), 0);
        assert_eq!(count, 10);

        let mut coord: [c_double; 3] = [0.0; 3];
        assert_eq!(mesh_node_coords(2, 4, coord.as_mut_ptr()), 0);
        assert_eq!(coord, [1.0, 1.0, 1.0]);

        let mut stale: [c_double; 3] = [7.0; 3];
        assert_eq!(mesh_node_coords(2, 99, stale.as_mut_ptr()), 5);
        assert_eq!(stale, [7.0; 3], "outputs untouched on failure");

        assert_eq!(mesh_ntwins(&mut count), 0);
        assert_eq!(count, 6);
        let (mut first, mut second): (c_int, c_int) = (0, 0);
        assert_eq!(mesh_twin_pair(1, &mut first, &mut second), 0);
        assert_eq!((first, second), (2, 11));

        assert_eq!(mesh_nnodes_set(MESH_NOPART, MESH_SURF, 5, &mut count), 0);
        assert_eq!(count, 4);
        assert_eq!(mesh_node_set(2, MESH_VOL, 7, 1, &mut count), 0);
        assert_eq!(count, 8);
        assert_eq!(mesh_nnodes_set(2, 9, 5, &mut count), 2, "invalid domain kind");

        assert_eq!(mesh_nels(MESH_NOPART, &mut count), 0);
        assert_eq!(count, 2);
        let mut nodes: [c_int; 10] = [0; 10];
        assert_eq!(mesh_el_tet10(2, 1, nodes.as_mut_ptr()), 0);
        assert_eq!(nodes, [1, 2, 3, 4, 5, 7, 6, 8, 9, 10]);

        assert_eq!(mesh_func_init(funcs.as_ptr()), 0);
        let (rc, res) = call(&cstr("f1"), "d", &[mesh_arg { d: 10.0 }]);
        assert_eq!((rc, res), (0, 10.0));
        let (rc, _) = call(&cstr("f2"), "d", &[mesh_arg { d: 10.0 }]);
        assert_eq!(rc, 5, "raising function");
        let (rc, res) = call(&cstr("f2"), "id", &[mesh_arg { i: 3 }, mesh_arg { d: 10.5 }]);
        assert_eq!((rc, res), (0, 31.5));
        let (rc, res) = call(&cstr("f3"), "i_d", &[mesh_arg { i: -2 }, mesh_arg { d: 2.0 }]);
        assert_eq!((rc, res), (0, 4.0));
        let (rc, res) = call(&cstr("ity"), "d", &[mesh_arg { d: 1.5 }]);
        assert_eq!((rc, res), (0, 0.0));
        let (rc, res) = call(&cstr("ity"), "i", &[mesh_arg { i: 2 }]);
        assert_eq!((rc, res), (0, 1.0));
        let foo = cstr("foo");
        let (rc, res) = call(&cstr("f4"), "cd", &[mesh_arg { c: foo.as_ptr() }, mesh_arg { d: 5.0 }]);
        assert_eq!(rc, 0);
        assert!((res - 12.42).abs() < 1e-12);
        let (rc, res) = call(&cstr("label"), "", &[]);
        assert_eq!(rc, 0);
        assert!(res.is_nan());
        let (rc, _) = call(&cstr("f2"), "id", &[mesh_arg { i: 3 }]);
        assert_eq!(rc, 2, "too few arguments");

        meshlib_close();
        meshlib_close();
        assert_eq!(mesh_nels(MESH_NOPART, &mut count), 2, "query after close");
    }
}
