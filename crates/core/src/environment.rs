//! Lexical scoping (spec.md §4.2): "a hash table of local bindings plus a
//! strong reference to an enclosing environment (or none, for the global
//! scope)".
//!
//! The global environment is created once and lives for the whole program.
//! Block and call environments are created on scope entry; a closure
//! extends its captured environment's lifetime simply by holding an `Rc`
//! to it — there is nothing else to manage, which is the point of §9's
//! "ownership re-architecture" design note.

use crate::table::{ConstViolation, Table};
use crate::value::Value;
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefineError {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetError {
    /// The binding exists somewhere in the scope chain but is const.
    Const(String),
    /// No binding by that name exists in any enclosing scope.
    Undefined(String),
}

#[derive(Debug)]
pub struct Environment {
    table: Table,
    parent: Option<Rc<RefCell<Environment>>>,
}

impl Environment {
    pub fn new_global() -> Rc<RefCell<Environment>> {
        Rc::new(RefCell::new(Environment {
            table: Table::new(),
            parent: None,
        }))
    }

    pub fn new_child(parent: &Rc<RefCell<Environment>>) -> Rc<RefCell<Environment>> {
        Rc::new(RefCell::new(Environment {
            table: Table::new(),
            parent: Some(Rc::clone(parent)),
        }))
    }

    /// Bind `name` in *this* scope only. Fails if `name` is already defined
    /// here — spec.md §4.3: "Redeclaration in the same scope is an error."
    /// Shadowing an outer scope's binding of the same name is fine.
    pub fn define(&mut self, name: &str, value: Value, is_const: bool) -> Result<(), DefineError> {
        if self.table.contains(name) {
            return Err(DefineError {
                name: name.to_string(),
            });
        }
        self.table.define(name, value, is_const);
        Ok(())
    }

    /// Bind `name` in *this* scope, overwriting any existing binding (and
    /// its const-ness) rather than rejecting the redefinition. For host-level
    /// rebinding such as `@import` shadowing a builtin, not for user `:=`/`::`
    /// declarations, which must go through [`Environment::define`].
    pub fn force_define(&mut self, name: &str, value: Value, is_const: bool) {
        self.table.define(name, value, is_const);
    }

    /// Look up `name`, walking outward through enclosing scopes.
    pub fn get(&self, name: &str) -> Option<Value> {
        if let Some(v) = self.table.get(name) {
            return Some(v.clone());
        }
        match &self.parent {
            Some(p) => p.borrow().get(name),
            None => None,
        }
    }

    /// Look up `name` in this scope only, without walking to parents.
    pub fn get_local(&self, name: &str) -> Option<Value> {
        self.table.get(name).cloned()
    }

    /// Assign to an existing binding, walking outward to find the scope
    /// that defines it. Fails if the binding is const, or if no such
    /// binding exists anywhere in the chain.
    pub fn set(&mut self, name: &str, value: Value) -> Result<(), SetError> {
        if self.table.contains(name) {
            return match self.table.set(name, value) {
                Ok(_) => Ok(()),
                Err(ConstViolation) => Err(SetError::Const(name.to_string())),
            };
        }
        match &self.parent {
            Some(p) => p.borrow_mut().set(name, value),
            None => Err(SetError::Undefined(name.to_string())),
        }
    }

    /// Whether `name` is const anywhere reachable from this scope.
    pub fn is_const(&self, name: &str) -> bool {
        if self.table.contains(name) {
            return self.table.is_const(name);
        }
        match &self.parent {
            Some(p) => p.borrow().is_const(name),
            None => false,
        }
    }

    pub fn parent(&self) -> Option<&Rc<RefCell<Environment>>> {
        self.parent.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redeclaration_in_same_scope_errors() {
        let env = Environment::new_global();
        env.borrow_mut().define("x", Value::Int(1), false).unwrap();
        let err = env.borrow_mut().define("x", Value::Int(2), false);
        assert!(err.is_err());
    }

    #[test]
    fn child_scope_can_shadow_parent() {
        let global = Environment::new_global();
        global
            .borrow_mut()
            .define("x", Value::Int(1), false)
            .unwrap();
        let child = Environment::new_child(&global);
        child
            .borrow_mut()
            .define("x", Value::Int(2), false)
            .unwrap();
        assert_eq!(
            child.borrow().get("x").unwrap().to_display_string(),
            "2"
        );
        assert_eq!(
            global.borrow().get("x").unwrap().to_display_string(),
            "1"
        );
    }

    #[test]
    fn set_walks_to_defining_scope_and_respects_const() {
        let global = Environment::new_global();
        global
            .borrow_mut()
            .define("PI", Value::Float(3.14), true)
            .unwrap();
        global
            .borrow_mut()
            .define("counter", Value::Int(0), false)
            .unwrap();
        let child = Environment::new_child(&global);

        assert_eq!(
            child.borrow_mut().set("counter", Value::Int(5)),
            Ok(())
        );
        assert_eq!(
            global.borrow().get("counter").unwrap().to_display_string(),
            "5"
        );

        assert_eq!(
            child.borrow_mut().set("PI", Value::Int(3)),
            Err(SetError::Const("PI".to_string()))
        );
        assert_eq!(
            child.borrow_mut().set("nope", Value::Int(1)),
            Err(SetError::Undefined("nope".to_string()))
        );
    }

    #[test]
    fn force_define_overwrites_value_and_const_flag() {
        let global = Environment::new_global();
        global
            .borrow_mut()
            .define("sqrt", Value::Int(0), false)
            .unwrap();
        global
            .borrow_mut()
            .force_define("sqrt", Value::Int(1), true);
        assert_eq!(
            global.borrow().get("sqrt").unwrap().to_display_string(),
            "1"
        );
        assert!(global.borrow().is_const("sqrt"));
        assert_eq!(
            global.borrow_mut().set("sqrt", Value::Int(2)),
            Err(SetError::Const("sqrt".to_string()))
        );
    }

    #[test]
    fn get_local_does_not_see_parent() {
        let global = Environment::new_global();
        global
            .borrow_mut()
            .define("x", Value::Int(1), false)
            .unwrap();
        let child = Environment::new_child(&global);
        assert!(child.borrow().get_local("x").is_none());
        assert!(child.borrow().get("x").is_some());
    }
}
