//! The list surface the engine drives.
//!
//! The engine never draws anything. It pushes change notifications into a
//! [`ListSurface`] and answers the surface's pull requests for cells through
//! [`crate::engine::Engine::cell_at`], which decides whether a position is a
//! live item, a placeholder or the trailing loading row.

use crate::delta::IndexDelta;

pub trait ListSurface<T> {
    /// Whatever the surface renders per row.
    type Cell;

    /// Positions touched by the last merge. `None` means redraw everything.
    fn on_delta_computed(&mut self, delta: Option<&IndexDelta>);

    /// Fired after every accepted page and after a reset.
    fn on_dataset_changed(&mut self, dataset: &[T]);

    /// Build the cell for `position`. `item` is `None` for placeholders.
    fn cell(&mut self, position: usize, item: Option<&T>, placeholder: bool) -> Self::Cell;

    /// Build the trailing "loading more" cell.
    fn loading_cell(&mut self, position: usize) -> Self::Cell;

    /// A fetch for `page` failed in the current session. The page will be
    /// requested again on the next qualifying scroll event.
    fn on_fetch_failed(&mut self, _page: usize, _error: &anyhow::Error) {}
}
