// ============================================================================
// Domain Layer
// ============================================================================
//
// Order aggregate, its wire shape and its acceptance rules. No I/O lives
// here; storage, messaging and caching depend on this layer, never the other
// way around.
//
// ============================================================================

pub mod order;
