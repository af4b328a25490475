// Typed mesh queries routed through `Session::invoke`.
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::bridge::{Session, path_str};
use crate::core::error::Error;
use crate::core::marshal::{Arg, Decode, Method, Request, Response};

/// Raw value of [`Phys::All`] on the script side.
pub const MESH_NOPART: i32 = -1;

/// Physical group filter; `All` selects the whole mesh.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(from = "i32", into = "i32")]
pub enum Phys {
    #[default]
    All,
    Group(i32),
}

impl Phys {
    pub fn to_raw(self) -> i32 {
        match self {
            Phys::All => MESH_NOPART,
            Phys::Group(id) => id,
        }
    }
}

impl From<i32> for Phys {
    fn from(raw: i32) -> Self {
        if raw == MESH_NOPART {
            Phys::All
        } else {
            Phys::Group(raw)
        }
    }
}

impl From<Phys> for i32 {
    fn from(phys: Phys) -> Self {
        phys.to_raw()
    }
}

impl From<Option<i32>> for Phys {
    fn from(raw: Option<i32>) -> Self {
        raw.map(Phys::from).unwrap_or(Phys::All)
    }
}

impl From<Phys> for Arg {
    fn from(phys: Phys) -> Self {
        Arg::Int(i64::from(phys.to_raw()))
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum DomainKind {
    #[serde(rename = "surf")]
    Surface = 1,
    #[serde(rename = "vol")]
    Volume = 2,
}

impl DomainKind {
    pub fn to_raw(self) -> i32 {
        self as i32
    }

    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            1 => Some(DomainKind::Surface),
            2 => Some(DomainKind::Volume),
            _ => None,
        }
    }
}

impl From<DomainKind> for Arg {
    fn from(dom: DomainKind) -> Self {
        Arg::Int(i64::from(dom.to_raw()))
    }
}

/// Parameters of the script-side `init` method.
///
/// Defaults describe an unpartitioned mesh: zero radii and every group set to
/// [`Phys::All`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MeshSetup {
    pub file: PathBuf,
    #[serde(default)]
    pub outer_radius: f64,
    #[serde(default)]
    pub inner_radius: f64,
    #[serde(default)]
    pub phys_pellet: Phys,
    #[serde(default)]
    pub phys_clad: Phys,
    #[serde(default)]
    pub phys_surf_pellet: Phys,
    #[serde(default)]
    pub phys_surf_clad: Phys,
}

impl MeshSetup {
    pub fn new(file: impl Into<PathBuf>) -> Self {
        Self {
            file: file.into(),
            outer_radius: 0.0,
            inner_radius: 0.0,
            phys_pellet: Phys::All,
            phys_clad: Phys::All,
            phys_surf_pellet: Phys::All,
            phys_surf_clad: Phys::All,
        }
    }

    /// Pellet outer radius and clad inner radius.
    pub fn with_radii(mut self, outer_radius: f64, inner_radius: f64) -> Self {
        self.outer_radius = outer_radius;
        self.inner_radius = inner_radius;
        self
    }

    pub fn with_volumes(mut self, pellet: impl Into<Phys>, clad: impl Into<Phys>) -> Self {
        self.phys_pellet = pellet.into();
        self.phys_clad = clad.into();
        self
    }

    pub fn with_surfaces(mut self, pellet: impl Into<Phys>, clad: impl Into<Phys>) -> Self {
        self.phys_surf_pellet = pellet.into();
        self.phys_surf_clad = clad.into();
        self
    }

    fn request(&self) -> Result<Request, Error> {
        Ok(Request::new(Method::Init)
            .arg(path_str(&self.file)?)
            .arg(self.outer_radius)
            .arg(self.inner_radius)
            .arg(self.phys_pellet)
            .arg(self.phys_clad)
            .arg(self.phys_surf_pellet)
            .arg(self.phys_surf_clad))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct NodeCoords(pub [f64; 3]);

impl NodeCoords {
    pub fn distance(&self, other: &[f64; 3]) -> f64 {
        self.0
            .iter()
            .zip(other)
            .map(|(a, b)| (a - b) * (a - b))
            .sum::<f64>()
            .sqrt()
    }
}

impl Decode for NodeCoords {
    const ARITY: usize = 1;

    fn decode(response: &mut Response<'_>) -> Result<Self, Error> {
        response.pop_number_tuple::<3>().map(NodeCoords)
    }
}

/// Ten-node tetrahedron connectivity.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub struct Tet10(pub [i64; 10]);

impl Decode for Tet10 {
    const ARITY: usize = 1;

    fn decode(response: &mut Response<'_>) -> Result<Self, Error> {
        response.pop_int_tuple::<10>().map(Tet10)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub struct TwinPair {
    pub first: i64,
    pub second: i64,
}

impl Decode for TwinPair {
    const ARITY: usize = 2;

    fn decode(response: &mut Response<'_>) -> Result<Self, Error> {
        let second = response.pop_int()?;
        let first = response.pop_int()?;
        Ok(TwinPair { first, second })
    }
}

impl Session {
    /// Builds the mesh; must succeed before any node or element query.
    pub fn mesh_init(&mut self, setup: &MeshSetup) -> Result<(), Error> {
        let request = setup.request()?;
        self.invoke(request)
    }

    pub fn nnodes(&mut self, phys: Phys) -> Result<i64, Error> {
        self.invoke(Request::new(Method::Nnodes).arg(phys))
    }

    pub fn node_coords(&mut self, phys: Phys, node: i64) -> Result<NodeCoords, Error> {
        self.invoke(Request::new(Method::NodeCoords).arg(phys).arg(node))
    }

    pub fn ntwins(&mut self) -> Result<i64, Error> {
        self.invoke(Request::new(Method::Ntwins))
    }

    pub fn twin_pair(&mut self, ktwin: i64) -> Result<TwinPair, Error> {
        self.invoke(Request::new(Method::TwinPair).arg(ktwin))
    }

    pub fn nnodes_set(&mut self, phys: Phys, dom: DomainKind, id_set: i64) -> Result<i64, Error> {
        self.invoke(
            Request::new(Method::NnodesSet)
                .arg(phys)
                .arg(dom)
                .arg(id_set),
        )
    }

    pub fn node_set(
        &mut self,
        phys: Phys,
        dom: DomainKind,
        id_set: i64,
        knode: i64,
    ) -> Result<i64, Error> {
        self.invoke(
            Request::new(Method::NodeSet)
                .arg(phys)
                .arg(dom)
                .arg(id_set)
                .arg(knode),
        )
    }

    pub fn nels(&mut self, phys: Phys) -> Result<i64, Error> {
        self.invoke(Request::new(Method::Nels).arg(phys))
    }

    pub fn el_tet10(&mut self, phys: Phys, kel: i64) -> Result<Tet10, Error> {
        self.invoke(Request::new(Method::ElTet10).arg(phys).arg(kel))
    }

    /// Loads a script of field functions for later `func_call`s.
    pub fn func_init(&mut self, file: impl AsRef<Path>) -> Result<(), Error> {
        let file = path_str(file.as_ref())?;
        self.invoke(Request::new(Method::FuncInit).arg(file))
    }
}

#[cfg(test)]
mod tests {
    use super::{DomainKind, MESH_NOPART, MeshSetup, NodeCoords, Phys};
    use crate::core::marshal::{Arg, Method};

    #[test]
    fn nopart_sentinel_maps_to_all() {
        assert_eq!(Phys::from(MESH_NOPART), Phys::All);
        assert_eq!(Phys::from(2), Phys::Group(2));
        assert_eq!(Phys::from(None), Phys::All);
        assert_eq!(Phys::All.to_raw(), -1);
        assert_eq!(Arg::from(Phys::Group(5)), Arg::Int(5));
    }

    #[test]
    fn domain_kind_raw_values() {
        assert_eq!(DomainKind::Surface.to_raw(), 1);
        assert_eq!(DomainKind::Volume.to_raw(), 2);
        assert_eq!(DomainKind::from_raw(2), Some(DomainKind::Volume));
        assert_eq!(DomainKind::from_raw(0), None);
    }

    #[test]
    fn setup_request_orders_init_arguments() {
        let setup = MeshSetup::new("fclad.msh")
            .with_radii(1.0, 1.1)
            .with_volumes(1, 2)
            .with_surfaces(5, 11);
        let request = setup.request().expect("request");
        assert_eq!(request.method(), Method::Init);
        assert_eq!(
            request.args(),
            &[
                Arg::Str("fclad.msh".to_string()),
                Arg::Float(1.0),
                Arg::Float(1.1),
                Arg::Int(1),
                Arg::Int(2),
                Arg::Int(5),
                Arg::Int(11),
            ]
        );
    }

    #[test]
    fn setup_defaults_are_unpartitioned() {
        let setup: MeshSetup =
            serde_json::from_str(r#"{"file":"fclad.msh","phys_clad":2}"#).expect("setup json");
        assert_eq!(setup.phys_pellet, Phys::All);
        assert_eq!(setup.phys_clad, Phys::Group(2));
        assert_eq!(setup.outer_radius, 0.0);
        assert_eq!(MeshSetup::new("fclad.msh").phys_surf_clad, Phys::All);
    }

    #[test]
    fn coords_distance_is_euclidean() {
        let coords = NodeCoords([3.0, 4.0, 0.0]);
        assert_eq!(coords.distance(&[0.0, 0.0, 0.0]), 5.0);
    }
}
