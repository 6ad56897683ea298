pub mod alias;
pub mod builder;
pub mod dominators;
pub mod effect;
pub mod error;
pub mod fold;
pub mod graph;
pub mod id;
pub mod loop_forest;
pub mod loop_induction;
pub mod node;
pub mod ops;
pub mod printer;
pub mod types;

// Re-export commonly used types
pub use alias::{query_field_ref, query_list, query_object, AliasResult};
pub use builder::{BytecodeOp, BytecodeProgram, GraphBuilder};
pub use dominators::{DominatorSet, Dominators};
pub use effect::{EffectGroup, EffectState};
pub use error::{HirError, HirResult};
pub use fold::{register_all_folders, Folder, FolderChain, FolderData, RefTable};
pub use graph::{Graph, OperandRef, RefList};
pub use id::NodeId;
pub use loop_forest::{LoopForest, LoopNode};
pub use loop_induction::{LoopIvReport, LoopInduction};
pub use node::{ControlFlowKind, EffectKind, ExprKind, NodeKind, OperandVec};
pub use ops::{ArithOp, BinaryOp, BitwiseOp, CmpOp, Intrinsic, LogicOp, UnaryOp};
pub use printer::{print, Chain, PrintOptions};
pub use types::{ConstValue, NumericKind, TypeKind};
