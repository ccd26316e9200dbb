use std::{
    cell::{Ref, RefCell, RefMut},
    collections::BTreeMap,
    fmt,
    rc::Rc,
    str::FromStr,
};

use serde::{Deserialize, Serialize};

use crate::lattice::error::{LatticeError, empty_cache, unknown_coordinate, unknown_element_type};

/// Alignment coordinates a mover can act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Coordinate {
    X,
    Y,
    Xp,
    Yp,
    Roll,
}

impl Coordinate {
    pub const ALL: [Coordinate; 5] = [
        Coordinate::X,
        Coordinate::Y,
        Coordinate::Xp,
        Coordinate::Yp,
        Coordinate::Roll,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Coordinate::X => "x",
            Coordinate::Y => "y",
            Coordinate::Xp => "xp",
            Coordinate::Yp => "yp",
            Coordinate::Roll => "roll",
        }
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Coordinate {
    type Err = LatticeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Coordinate::ALL
            .into_iter()
            .find(|coord| coord.as_str() == s)
            .ok_or_else(|| unknown_coordinate(s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementType {
    Quadrupole,
    Cavity,
    Bpm,
    Drift,
    Dipole,
    Sbend,
    Multipole,
}

impl ElementType {
    pub const ALL: [ElementType; 7] = [
        ElementType::Quadrupole,
        ElementType::Cavity,
        ElementType::Bpm,
        ElementType::Drift,
        ElementType::Dipole,
        ElementType::Sbend,
        ElementType::Multipole,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ElementType::Quadrupole => "Quadrupole",
            ElementType::Cavity => "Cavity",
            ElementType::Bpm => "Bpm",
            ElementType::Drift => "Drift",
            ElementType::Dipole => "Dipole",
            ElementType::Sbend => "Sbend",
            ElementType::Multipole => "Multipole",
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for ElementType {
    type Err = LatticeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ElementType::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| unknown_element_type(s))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Offsets {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub xp: f64,
    #[serde(default)]
    pub yp: f64,
    #[serde(default)]
    pub roll: f64,
}

impl Offsets {
    pub fn get(&self, coord: Coordinate) -> f64 {
        match coord {
            Coordinate::X => self.x,
            Coordinate::Y => self.y,
            Coordinate::Xp => self.xp,
            Coordinate::Yp => self.yp,
            Coordinate::Roll => self.roll,
        }
    }

    pub fn set(&mut self, coord: Coordinate, value: f64) {
        match coord {
            Coordinate::X => self.x = value,
            Coordinate::Y => self.y = value,
            Coordinate::Xp => self.xp = value,
            Coordinate::Yp => self.yp = value,
            Coordinate::Roll => self.roll = value,
        }
    }

    pub fn add(&mut self, other: &Offsets) {
        for coord in Coordinate::ALL {
            self.set(coord, self.get(coord) + other.get(coord));
        }
    }
}

/// A beamline element as mirrored from the simulator lattice.
///
/// `mismatch` is the rounding error accumulated on this element's movers by
/// every knob that touches it. It belongs to the element, not to a knob.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub name: String,
    pub element_type: ElementType,
    pub s: f64,
    pub length: f64,
    pub offsets: Offsets,
    pub tilt: f64,
    pub girder: Option<usize>,
    pub index: Option<usize>,
    pub parameters: BTreeMap<String, String>,
    mismatch: BTreeMap<Coordinate, f64>,
    cached_offsets: Option<Offsets>,
}

impl Element {
    pub fn new(element_type: ElementType) -> Self {
        Self {
            name: String::new(),
            element_type,
            s: 0.0,
            length: 0.0,
            offsets: Offsets::default(),
            tilt: 0.0,
            girder: None,
            index: None,
            parameters: BTreeMap::new(),
            mismatch: BTreeMap::new(),
            cached_offsets: None,
        }
    }

    pub fn quadrupole() -> Self {
        Self::new(ElementType::Quadrupole)
    }

    pub fn cavity() -> Self {
        Self::new(ElementType::Cavity)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_length(mut self, length: f64) -> Self {
        self.length = length;
        self
    }

    pub fn with_offsets(mut self, offsets: Offsets) -> Self {
        self.offsets = offsets;
        self
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, coord: Coordinate) -> f64 {
        self.offsets.get(coord)
    }

    pub fn set(&mut self, coord: Coordinate, value: f64) {
        self.offsets.set(coord, value);
    }

    pub fn mismatch(&self, coord: Coordinate) -> f64 {
        self.mismatch.get(&coord).copied().unwrap_or(0.0)
    }

    pub fn mismatch_ledger(&self) -> &BTreeMap<Coordinate, f64> {
        &self.mismatch
    }

    /// Registers `coord` in the ledger without changing an existing entry.
    pub fn touch_mismatch(&mut self, coord: Coordinate) {
        self.mismatch.entry(coord).or_insert(0.0);
    }

    pub fn add_mismatch(&mut self, coord: Coordinate, delta: f64) {
        *self.mismatch.entry(coord).or_insert(0.0) += delta;
    }

    pub fn cache_offsets(&mut self) {
        self.cached_offsets = Some(self.offsets);
    }

    pub fn has_cached_offsets(&self) -> bool {
        self.cached_offsets.is_some()
    }

    pub fn restore_offsets(&mut self, clear_cache: bool) -> Result<(), LatticeError> {
        let cached = self.cached_offsets.ok_or_else(|| {
            empty_cache(format!("element '{}' has no cached offsets", self.name))
        })?;
        self.offsets = cached;
        if clear_cache {
            self.cached_offsets = None;
        }
        Ok(())
    }

    /// Copy without ledger, cache or beamline placement.
    pub fn duplicate(&self) -> Self {
        Self {
            girder: None,
            index: None,
            mismatch: BTreeMap::new(),
            cached_offsets: None,
            ..self.clone()
        }
    }

    pub fn to_placet(&self) -> String {
        let mut line = format!("{} -name {}", self.element_type, quote(&self.name));
        line.push_str(&format!(" -s {} -length {}", self.s, self.length));
        for coord in Coordinate::ALL {
            line.push_str(&format!(" -{} {}", coord, self.get(coord)));
        }
        line.push_str(&format!(" -tilt {}", self.tilt));
        for (key, value) in &self.parameters {
            let value = if value.parse::<f64>().is_ok() {
                value.clone()
            } else {
                quote(value)
            };
            line.push_str(&format!(" -{key} {value}"));
        }
        line
    }
}

fn quote(value: &str) -> String {
    format!("\"{value}\"")
}

/// Shared, identity-carrying reference to an [`Element`].
///
/// Knobs and the beamline hold clones of the same handle; two handles are the
/// same element only when [`ElementHandle::ptr_eq`] holds.
#[derive(Clone)]
pub struct ElementHandle(Rc<RefCell<Element>>);

impl ElementHandle {
    pub fn new(element: Element) -> Self {
        Self(Rc::new(RefCell::new(element)))
    }

    pub fn borrow(&self) -> Ref<'_, Element> {
        self.0.borrow()
    }

    pub fn borrow_mut(&self) -> RefMut<'_, Element> {
        self.0.borrow_mut()
    }

    pub fn ptr_eq(&self, other: &ElementHandle) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn element_type(&self) -> ElementType {
        self.0.borrow().element_type
    }

    pub fn name(&self) -> String {
        self.0.borrow().name.clone()
    }

    pub fn get(&self, coord: Coordinate) -> f64 {
        self.0.borrow().get(coord)
    }

    pub fn set(&self, coord: Coordinate, value: f64) {
        self.0.borrow_mut().set(coord, value);
    }

    pub fn shift(&self, coord: Coordinate, delta: f64) {
        let mut element = self.0.borrow_mut();
        let value = element.get(coord) + delta;
        element.set(coord, value);
    }

    pub fn mismatch(&self, coord: Coordinate) -> f64 {
        self.0.borrow().mismatch(coord)
    }

    pub fn add_mismatch(&self, coord: Coordinate, delta: f64) {
        self.0.borrow_mut().add_mismatch(coord, delta);
    }

    pub fn touch_mismatch(&self, coord: Coordinate) {
        self.0.borrow_mut().touch_mismatch(coord);
    }
}

impl From<Element> for ElementHandle {
    fn from(element: Element) -> Self {
        Self::new(element)
    }
}

impl fmt::Debug for ElementHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.try_borrow() {
            Ok(element) => f
                .debug_tuple("ElementHandle")
                .field(&element.element_type)
                .field(&element.name)
                .finish(),
            Err(_) => f.write_str("ElementHandle(<borrowed>)"),
        }
    }
}
