use std::{fmt, fs, path::Path};

use crate::{
    knob::{ApplyOptions, Knob, Strategy},
    lattice::{
        element::{Coordinate, Element, ElementHandle, ElementType, Offsets},
        error::{
            LatticeError, element_not_in_beamline, empty_cache, invalid_request, io_error,
            knob_already_attached, parse_error, unknown_knob,
        },
        girder::Girder,
        parser::{LatticeParser, ParsedLine},
    },
};

/// In-memory mirror of a beamline: ordered elements, their girders and the
/// knobs allowed to act on them.
#[derive(Debug)]
pub struct Beamline {
    pub name: String,
    elements: Vec<ElementHandle>,
    girders: Vec<Girder>,
    knobs: Vec<Knob>,
}

impl Beamline {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            elements: Vec::new(),
            girders: Vec::new(),
            knobs: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ElementHandle> {
        self.elements.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ElementHandle> {
        self.elements.iter()
    }

    pub fn contains(&self, element: &ElementHandle) -> bool {
        self.elements.iter().any(|item| item.ptr_eq(element))
    }

    /// Appends a copy of `element` at the end of the lattice.
    ///
    /// The element lands on the last girder, or on a fresh one when
    /// `new_girder` is set. A fresh girder cannot be opened once off-girder
    /// elements exist; the element then stays off-girder.
    pub fn append(&mut self, element: Element, new_girder: bool) -> ElementHandle {
        let open_girder = if new_girder && !self.elements.is_empty() && self.girders.is_empty() {
            tracing::warn!(
                target: "lattice",
                beamline = %self.name,
                "cannot create a new girder when previous elements are not on girders"
            );
            false
        } else {
            new_girder
        };
        self.push(element.duplicate(), open_girder)
    }

    fn push(&mut self, mut element: Element, open_girder: bool) -> ElementHandle {
        if open_girder {
            self.girders
                .push(Girder::new(format!("{}", self.girders.len() + 1)));
        }

        let (previous_s, next_index) = match self.elements.last() {
            Some(last) => {
                let last = last.borrow();
                (last.s, last.index.map_or(self.elements.len(), |i| i + 1))
            }
            None => (0.0, 0),
        };
        element.s = previous_s + element.length;
        element.index = Some(next_index);
        element.girder = if self.girders.is_empty() {
            None
        } else {
            Some(self.girders.len())
        };

        let handle = ElementHandle::new(element);
        if let Some(girder) = self.girders.last_mut() {
            girder.push(handle.clone());
        }
        self.elements.push(handle.clone());
        handle
    }

    /// Puts a copy of `element` at `index`, on the girder of the element it replaces.
    pub fn replace(&mut self, index: usize, element: Element) -> Result<ElementHandle, LatticeError> {
        let old = self
            .elements
            .get(index)
            .cloned()
            .ok_or_else(|| invalid_request(format!("element index {index} is out of range")))?;

        let mut new_element = element.duplicate();
        {
            let old_element = old.borrow();
            new_element.girder = old_element.girder;
            new_element.index = old_element.index;
            new_element.s = old_element.s;
        }
        let handle = ElementHandle::new(new_element);
        for girder in &mut self.girders {
            if girder.replace(&old, handle.clone()) {
                break;
            }
        }
        self.elements[index] = handle.clone();
        Ok(handle)
    }

    pub fn girders_number(&self) -> usize {
        self.girders.len()
    }

    /// Girder by its 1-based number.
    pub fn girder(&self, number: usize) -> Option<&Girder> {
        number.checked_sub(1).and_then(|i| self.girders.get(i))
    }

    pub fn extract<'a>(
        &'a self,
        types: &'a [ElementType],
    ) -> impl Iterator<Item = &'a ElementHandle> + 'a {
        self.elements
            .iter()
            .filter(move |element| types.contains(&element.element_type()))
    }

    pub fn indices_of(&self, element_type: ElementType) -> Vec<usize> {
        self.elements
            .iter()
            .enumerate()
            .filter(|(_, element)| element.element_type() == element_type)
            .map(|(i, element)| element.borrow().index.unwrap_or(i))
            .collect()
    }

    /// Zeroes the listed coordinates (every coordinate and the tilt when `None`).
    pub fn realign_elements(&mut self, coordinates: Option<&[Coordinate]>) {
        for element in &self.elements {
            let mut element = element.borrow_mut();
            match coordinates {
                Some(coords) => {
                    for coord in coords {
                        element.set(*coord, 0.0);
                    }
                }
                None => {
                    element.offsets = Offsets::default();
                    element.tilt = 0.0;
                }
            }
        }
    }

    pub fn misalign_element(&mut self, index: usize, offsets: &Offsets) -> Result<(), LatticeError> {
        let element = self
            .elements
            .get(index)
            .ok_or_else(|| invalid_request(format!("element index {index} is out of range")))?;
        element.borrow_mut().offsets.add(offsets);
        Ok(())
    }

    pub fn misalign_girder(&mut self, number: usize, offsets: &Offsets) -> Result<(), LatticeError> {
        let girder = self
            .girder(number)
            .ok_or_else(|| invalid_request(format!("girder {number} does not exist")))?;
        for element in &girder.elements {
            element.borrow_mut().offsets.add(offsets);
        }
        Ok(())
    }

    pub fn cache_lattice_data(&mut self, elements: &[ElementHandle]) -> Result<(), LatticeError> {
        self.ensure_members(elements)?;
        for element in elements {
            element.borrow_mut().cache_offsets();
        }
        Ok(())
    }

    pub fn upload_from_cache(
        &mut self,
        elements: &[ElementHandle],
        clear_cache: bool,
    ) -> Result<(), LatticeError> {
        self.ensure_members(elements)?;
        if let Some(missing) = elements.iter().find(|e| !e.borrow().has_cached_offsets()) {
            return Err(empty_cache(format!(
                "element '{}' has no cached offsets",
                missing.name()
            )));
        }
        for element in elements {
            element.borrow_mut().restore_offsets(clear_cache)?;
        }
        Ok(())
    }

    fn ensure_members(&self, elements: &[ElementHandle]) -> Result<(), LatticeError> {
        match elements.iter().find(|element| !self.contains(element)) {
            Some(missing) => Err(element_not_in_beamline(format!(
                "element '{}' is not present in beamline '{}'",
                missing.name(),
                self.name
            ))),
            None => Ok(()),
        }
    }

    pub fn attach_knob(&mut self, knob: Knob) -> Result<(), LatticeError> {
        if self.knobs.iter().any(|attached| attached.name() == knob.name()) {
            return Err(knob_already_attached(knob.name()));
        }
        self.ensure_members(knob.elements())?;
        tracing::debug!(
            target: "lattice",
            beamline = %self.name,
            knob = %knob.name(),
            elements = knob.elements().len(),
            "knob_attached"
        );
        self.knobs.push(knob);
        Ok(())
    }

    pub fn detach_knob(&mut self, name: &str) -> Option<Knob> {
        let position = self.knobs.iter().position(|knob| knob.name() == name)?;
        Some(self.knobs.remove(position))
    }

    pub fn knob(&self, name: &str) -> Option<&Knob> {
        self.knobs.iter().find(|knob| knob.name() == name)
    }

    pub fn knob_mut(&mut self, name: &str) -> Option<&mut Knob> {
        self.knobs.iter_mut().find(|knob| knob.name() == name)
    }

    pub fn knobs(&self) -> impl Iterator<Item = &Knob> {
        self.knobs.iter()
    }

    /// Applies an attached knob after checking its elements are still part of
    /// this beamline (they may have been swapped out by [`Beamline::replace`]).
    pub fn apply_knob(
        &mut self,
        name: &str,
        amplitude: f64,
        strategy: Strategy,
        options: &ApplyOptions,
    ) -> Result<(), LatticeError> {
        let knob = self.knob(name).ok_or_else(|| unknown_knob(name))?;
        self.ensure_members(knob.elements())?;
        let knob = self.knob_mut(name).ok_or_else(|| unknown_knob(name))?;
        knob.apply(amplitude, strategy, options)?;
        Ok(())
    }

    pub fn read_placet_lattice(name: impl Into<String>, path: &Path) -> Result<Self, LatticeError> {
        let text = fs::read_to_string(path)
            .map_err(|err| io_error(format!("failed to read {}: {err}", path.display())))?;
        Self::from_placet_str(name, &text)
    }

    pub fn from_placet_str(name: impl Into<String>, text: &str) -> Result<Self, LatticeError> {
        let parser = LatticeParser::new()?;
        let mut beamline = Self::new(name);
        let mut open_girder = false;

        for (i, line) in text.lines().enumerate() {
            match parser.parse_line(line, i + 1)? {
                ParsedLine::Skip => {}
                ParsedLine::Girder => open_girder = true,
                ParsedLine::Unsupported(keyword) => {
                    tracing::warn!(
                        target: "lattice",
                        line = i + 1,
                        keyword = %keyword,
                        "unsupported element is ignored"
                    );
                }
                ParsedLine::Element(element) => {
                    beamline.push(element, open_girder);
                    open_girder = false;
                }
            }
        }

        tracing::info!(
            target: "lattice",
            beamline = %beamline.name,
            elements = beamline.len(),
            girders = beamline.girders_number(),
            "lattice_parsed"
        );
        Ok(beamline)
    }

    pub fn to_placet(&self) -> String {
        let mut text = String::new();
        let mut current_girder = None;
        for element in &self.elements {
            let element = element.borrow();
            if element.girder.is_some() && element.girder != current_girder {
                text.push_str("Girder\n");
                current_girder = element.girder;
            }
            text.push_str(&element.to_placet());
            text.push('\n');
        }
        text
    }

    /// One line per element in the layout of Placet's `SaveAllPositions`.
    pub fn misalignments_to_string(&self) -> String {
        let mut text = String::new();
        for element in &self.elements {
            let element = element.borrow();
            let o = element.offsets;
            let line = match element.element_type {
                ElementType::Quadrupole => format!("{} {} {} {} {}", o.y, o.yp, o.x, o.xp, o.roll),
                ElementType::Dipole => format!(
                    "{} {}",
                    element.parameters.get("strength_y").map_or("0", String::as_str),
                    element.parameters.get("strength_x").map_or("0", String::as_str),
                ),
                _ => format!("{} {} {} {}", o.y, o.yp, o.x, o.xp),
            };
            text.push_str(&line);
            text.push('\n');
        }
        text
    }

    pub fn save_misalignments(&self, path: &Path) -> Result<(), LatticeError> {
        if self.elements.is_empty() {
            return Err(invalid_request("cannot save misalignments of an empty lattice"));
        }
        fs::write(path, self.misalignments_to_string())
            .map_err(|err| io_error(format!("failed to write {}: {err}", path.display())))
    }

    pub fn read_misalignments(&mut self, path: &Path) -> Result<(), LatticeError> {
        let text = fs::read_to_string(path)
            .map_err(|err| io_error(format!("failed to read {}: {err}", path.display())))?;
        self.apply_misalignments_str(&text)
    }

    pub fn apply_misalignments_str(&mut self, text: &str) -> Result<(), LatticeError> {
        if self.elements.is_empty() {
            return Err(invalid_request("cannot read misalignments into an empty lattice"));
        }
        let lines: Vec<&str> = text.lines().collect();
        if lines.len() < self.elements.len() {
            return Err(invalid_request(format!(
                "misalignment data has {} lines, lattice has {} elements",
                lines.len(),
                self.elements.len()
            )));
        }

        let mut parsed = Vec::with_capacity(self.elements.len());
        for (i, (element, line)) in self.elements.iter().zip(&lines).enumerate() {
            let values = line
                .split_whitespace()
                .map(|v| {
                    v.parse::<f64>()
                        .map_err(|_| parse_error(i + 1, format!("'{v}' is not a number")))
                })
                .collect::<Result<Vec<f64>, _>>()?;
            let expected = match element.element_type() {
                ElementType::Quadrupole => 5,
                ElementType::Dipole => 2,
                _ => 4,
            };
            if values.len() != expected {
                return Err(parse_error(
                    i + 1,
                    format!("expected {expected} values, found {}", values.len()),
                ));
            }
            parsed.push(values);
        }

        for (element, values) in self.elements.iter().zip(parsed) {
            let mut element = element.borrow_mut();
            if element.element_type == ElementType::Dipole {
                element
                    .parameters
                    .insert("strength_y".to_string(), values[0].to_string());
                element
                    .parameters
                    .insert("strength_x".to_string(), values[1].to_string());
                continue;
            }
            element.set(Coordinate::Y, values[0]);
            element.set(Coordinate::Yp, values[1]);
            element.set(Coordinate::X, values[2]);
            element.set(Coordinate::Xp, values[3]);
            if let Some(roll) = values.get(4) {
                element.set(Coordinate::Roll, *roll);
            }
        }
        Ok(())
    }
}

impl fmt::Display for Beamline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Beamline '{}'", self.name)?;
        writeln!(
            f,
            "{:>5} {:<12} {:<10} {:>6} {:>10} {:>10} {:>10} {:>10} {:>10}",
            "index", "name", "type", "girder", "s", "x", "xp", "y", "yp"
        )?;
        for element in &self.elements {
            let e = element.borrow();
            writeln!(
                f,
                "{:>5} {:<12} {:<10} {:>6} {:>10.4} {:>10.4} {:>10.4} {:>10.4} {:>10.4}",
                e.index.map_or_else(|| "-".to_string(), |i| i.to_string()),
                e.name,
                e.element_type,
                e.girder.map_or_else(|| "-".to_string(), |g| g.to_string()),
                e.s,
                e.offsets.x,
                e.offsets.xp,
                e.offsets.y,
                e.offsets.yp,
            )?;
        }
        Ok(())
    }
}
