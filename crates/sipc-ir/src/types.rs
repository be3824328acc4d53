//! LLVM type mapping (part of C6's program-level setup, 4.6).
//!
//! Every scalar SIP value - `int`, `bool`, a `Ref`, a first-class function
//! value - is a 64-bit word, so a variable's storage slot is always either
//! `i64` or `ptr`; only `Array` and `Record` values are themselves accessed
//! through a pointer to a separate struct.

use inkwell::context::Context;
use inkwell::types::{BasicTypeEnum, IntType, PointerType, StructType};
use inkwell::AddressSpace;

pub struct TypeMapper<'ctx> {
    context: &'ctx Context,
}

impl<'ctx> TypeMapper<'ctx> {
    pub fn new(context: &'ctx Context) -> Self {
        Self { context }
    }

    pub fn word(&self) -> IntType<'ctx> {
        self.context.i64_type()
    }

    pub fn ptr(&self) -> PointerType<'ctx> {
        self.context.ptr_type(AddressSpace::default())
    }

    pub fn bool_word(&self) -> IntType<'ctx> {
        self.context.i64_type()
    }

    /// `{ i64 length, ptr data }` - the boxed array representation (6,
    /// Glossary "Global record" sibling concept).
    pub fn array_struct(&self) -> StructType<'ctx> {
        self.context
            .struct_type(&[self.word().into(), self.ptr().into()], false)
    }

    /// The program's one global record struct: `field_count` word-sized
    /// slots, one per canonical field name. `AbsentField` still occupies a
    /// slot - it is simply never read back with a meaningful value.
    pub fn record_struct(&self, field_count: usize) -> StructType<'ctx> {
        let fields: Vec<BasicTypeEnum<'ctx>> = (0..field_count).map(|_| self.word().into()).collect();
        self.context.struct_type(&fields, false)
    }

    /// Map a solved type to the LLVM type its storage slot uses.
    pub fn map(&self, ty: &sipc_sem::Type) -> BasicTypeEnum<'ctx> {
        use sipc_sem::Type;
        match ty {
            Type::Int | Type::Bool | Type::Fun(_, _) => self.word().into(),
            Type::AbsentField => self.word().into(),
            Type::Ref(_) => self.ptr().into(),
            Type::Record(_) => self.ptr().into(),
            Type::Array(_) => self.ptr().into(),
            Type::Var(_) | Type::Alpha(_) | Type::Mu(_, _) => self.word().into(),
        }
    }
}
