pub mod inst;
pub mod num;
pub mod op;
pub mod operand;
pub mod reg;
