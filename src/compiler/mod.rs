//! 编译模块：将原始规则编译为分类后的规则集
pub mod pattern;
pub mod compiler;

pub use self::pattern::{ParameterRule, RuleSet, GeneralRules};
pub use self::compiler::{RuleCompiler, RuleSource};
