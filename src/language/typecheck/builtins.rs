use super::types::{Signature, TypeArena, TypeId};
use crate::language::resolved::MethodId;
use std::collections::BTreeMap;

/// Host-supplied description of a global's structural type.
#[derive(Clone, Debug, PartialEq)]
pub enum TypeSpec {
    Number,
    String,
    Boolean,
    /// Unconstrained; accepts whatever flows in.
    Any,
    Class(Vec<MethodSpec>),
}

#[derive(Clone, Debug, PartialEq)]
pub struct MethodSpec {
    pub name: String,
    pub params: Option<Vec<TypeSpec>>,
    pub result: TypeSpec,
}

impl MethodSpec {
    pub fn method(name: impl Into<String>, params: Vec<TypeSpec>, result: TypeSpec) -> Self {
        Self {
            name: name.into(),
            params: Some(params),
            result,
        }
    }

    pub fn getter(name: impl Into<String>, result: TypeSpec) -> Self {
        Self {
            name: name.into(),
            params: None,
            result,
        }
    }

    pub fn id(&self) -> MethodId {
        MethodId::new(self.name.clone(), self.params.as_ref().map(Vec::len))
    }
}

/// The nominal built-in types. Each is a label around a structural class
/// whose methods may mention the label itself.
#[derive(Clone, Copy, Debug)]
pub struct BuiltinTypes {
    pub number: TypeId,
    pub string: TypeId,
    pub boolean: TypeId,
}

const ARITHMETIC: [&str; 5] = ["+", "-", "*", "/", "%"];
const COMPARISON: [&str; 4] = ["<", "<=", ">", ">="];

impl BuiltinTypes {
    pub fn install(arena: &mut TypeArena) -> Self {
        let number_class = arena.class(BTreeMap::new());
        let string_class = arena.class(BTreeMap::new());
        let boolean_class = arena.class(BTreeMap::new());
        let builtins = Self {
            number: arena.labeled("Number", number_class),
            string: arena.labeled("String", string_class),
            boolean: arena.labeled("Boolean", boolean_class),
        };

        for name in ARITHMETIC {
            builtins.binary(arena, number_class, name, builtins.number, builtins.number);
        }
        for name in COMPARISON {
            builtins.binary(arena, number_class, name, builtins.number, builtins.boolean);
        }
        builtins.getter(arena, number_class, "-", builtins.number);
        builtins.getter(arena, number_class, "abs", builtins.number);

        builtins.binary(arena, string_class, "+", builtins.string, builtins.string);
        builtins.getter(arena, string_class, "count", builtins.number);

        builtins.getter(arena, boolean_class, "!", builtins.boolean);

        for class in [number_class, string_class, boolean_class] {
            builtins.getter(arena, class, "toString", builtins.string);
            for name in ["==", "!="] {
                let any = arena.fresh_variable();
                builtins.binary(arena, class, name, any, builtins.boolean);
            }
        }
        builtins
    }

    fn binary(
        self,
        arena: &mut TypeArena,
        class: TypeId,
        name: &str,
        operand: TypeId,
        result: TypeId,
    ) {
        arena.add_method(
            class,
            MethodId::method(name, 1),
            Signature {
                params: Some(vec![operand]),
                result,
            },
        );
    }

    fn getter(self, arena: &mut TypeArena, class: TypeId, name: &str, result: TypeId) {
        arena.add_method(
            class,
            MethodId::getter(name),
            Signature {
                params: None,
                result,
            },
        );
    }

    /// Interns a host description into the arena.
    pub fn intern(&self, arena: &mut TypeArena, spec: &TypeSpec) -> TypeId {
        match spec {
            TypeSpec::Number => self.number,
            TypeSpec::String => self.string,
            TypeSpec::Boolean => self.boolean,
            TypeSpec::Any => arena.fresh_variable(),
            TypeSpec::Class(methods) => {
                let mut table = BTreeMap::new();
                for method in methods {
                    let params = method.params.as_ref().map(|params| {
                        params
                            .iter()
                            .map(|param| self.intern(arena, param))
                            .collect()
                    });
                    let result = self.intern(arena, &method.result);
                    table.insert(method.id(), Signature { params, result });
                }
                arena.class(table)
            }
        }
    }
}
