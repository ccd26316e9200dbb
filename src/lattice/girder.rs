use crate::lattice::element::{ElementHandle, ElementType};

/// Support structure holding references to the elements placed on it.
#[derive(Debug, Clone)]
pub struct Girder {
    pub name: String,
    pub elements: Vec<ElementHandle>,
}

impl Girder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            elements: Vec::new(),
        }
    }

    pub fn push(&mut self, element: ElementHandle) {
        self.elements.push(element);
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn contains(&self, element: &ElementHandle) -> bool {
        self.elements.iter().any(|item| item.ptr_eq(element))
    }

    pub fn filter_types<'a>(
        &'a self,
        types: &'a [ElementType],
    ) -> impl Iterator<Item = &'a ElementHandle> + 'a {
        self.elements
            .iter()
            .filter(move |element| types.contains(&element.element_type()))
    }

    /// Swaps `old` for `new` in place, keeping the position on the girder.
    pub(crate) fn replace(&mut self, old: &ElementHandle, new: ElementHandle) -> bool {
        match self.elements.iter().position(|item| item.ptr_eq(old)) {
            Some(position) => {
                self.elements[position] = new;
                true
            }
            None => false,
        }
    }
}
