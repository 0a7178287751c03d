pub mod node_arena;
pub mod red_black_tree;

pub use node_arena::NodeArena;
pub use node_arena::SENTINEL;

pub use red_black_tree::Comparator;
pub use red_black_tree::Cursor;
pub use red_black_tree::MapError;
pub use red_black_tree::NaturalOrder;
pub use red_black_tree::OrderFn;
pub use red_black_tree::RedBlackTree;
