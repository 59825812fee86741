/// Per-save number allocation.
pub mod allocator;
/// Season-wide canonical numbering.
pub mod numbering;
/// Canonical cell ordering.
pub mod order;
/// Game status classification.
pub mod status;
/// Umpire slot normalization.
pub mod umpires;

pub use numbering::{AssignedNumbers, GameNumberMap, build_game_number_map, is_real_game};
pub use status::GameStatus;
pub use umpires::{UmpirePosition, UmpireSlot, UmpireSlots, normalize_umpires};
