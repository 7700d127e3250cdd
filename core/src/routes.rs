//! Status-code routing.
//!
//! A directive may carry an ordered table mapping sets of status codes to
//! overriding descriptors. The table is evaluated in registration order and
//! the first containment match wins, replacing whatever terminal descriptor
//! classification chose.

use crate::lifecycle::Descriptor;

/// Ordered `(code set, descriptor)` table.
#[derive(Clone)]
pub struct StatusRoutes<St> {
    routes: Vec<(Vec<u16>, Descriptor<St>)>,
}

impl<St> Default for StatusRoutes<St> {
    fn default() -> Self {
        Self { routes: Vec::new() }
    }
}

impl<St> StatusRoutes<St> {
    /// Empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a route. Earlier routes take precedence.
    #[must_use]
    pub fn on(mut self, codes: impl Into<Vec<u16>>, descriptor: Descriptor<St>) -> Self {
        self.routes.push((codes.into(), descriptor));
        self
    }

    /// First descriptor whose code set contains `status`, if any.
    #[must_use]
    pub fn route(&self, status: u16) -> Option<&Descriptor<St>> {
        self.routes
            .iter()
            .find(|(codes, _)| codes.contains(&status))
            .map(|(_, descriptor)| descriptor)
    }
}
