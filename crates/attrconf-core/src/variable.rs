//! Shared mutable value cells
//!
//! A [`Variable`] is a handle to a value that several mapping entries can
//! hold at once. Writing through any handle is observed by every holder.
//! Constraints (type, choices, validator, required) are checked on every
//! write.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use serde::{Serialize, Serializer};

use crate::annotation::{Annotation, Coerce};
use crate::error::{Error, Result};
use crate::value::Value;

/// Predicate applied to every value written into a cell
pub type Validator = Rc<dyn Fn(&Value) -> bool>;

struct Slot {
    value: Value,
    annotation: Option<Annotation>,
    choices: Option<Vec<Value>>,
    validator: Option<Validator>,
    required: bool,
    help: Option<String>,
}

/// A shared, mutable value cell
///
/// Cloning a `Variable` clones the handle, not the value:
///
/// ```
/// use attrconf_core::{Value, Variable};
///
/// let lr = Variable::new(0.1);
/// let alias = lr.clone();
/// alias.set(0.01).unwrap();
/// assert_eq!(lr.get(), Value::Float(0.01));
/// ```
#[derive(Clone)]
pub struct Variable {
    slot: Rc<RefCell<Slot>>,
}

impl Variable {
    /// Create a cell holding `value`
    ///
    /// Passing a cell yields a new cell holding a copy of its current value.
    pub fn new(value: impl Into<Value>) -> Self {
        Self {
            slot: Rc::new(RefCell::new(Slot {
                value: value.into().unwrapped(),
                annotation: None,
                choices: None,
                validator: None,
                required: false,
                help: None,
            })),
        }
    }

    /// Restrict written values to a type
    pub fn with_type(self, annotation: Annotation) -> Self {
        self.slot.borrow_mut().annotation = Some(annotation);
        self
    }

    /// Restrict written values to a fixed set
    pub fn with_choices<I, V>(self, choices: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.slot.borrow_mut().choices = Some(choices.into_iter().map(Into::into).collect());
        self
    }

    /// Reject written values for which `validator` returns false
    pub fn with_validator(self, validator: impl Fn(&Value) -> bool + 'static) -> Self {
        self.slot.borrow_mut().validator = Some(Rc::new(validator));
        self
    }

    /// Reject null when `required` is set
    pub fn required(self, required: bool) -> Self {
        self.slot.borrow_mut().required = required;
        self
    }

    /// Attach a description
    pub fn with_help(self, help: impl Into<String>) -> Self {
        self.slot.borrow_mut().help = Some(help.into());
        self
    }

    /// Current value (cloned)
    pub fn get(&self) -> Value {
        self.slot.borrow().value.clone()
    }

    /// Run `f` against the current value without cloning it
    pub fn with_value<R>(&self, f: impl FnOnce(&Value) -> R) -> R {
        f(&self.slot.borrow().value)
    }

    /// Validate and replace the held value
    ///
    /// A cell argument is unwrapped to its current value first, so cells
    /// never nest.
    pub fn set(&self, value: impl Into<Value>) -> Result<()> {
        let value = value.into().unwrapped();
        self.validate_value(&value)?;
        self.slot.borrow_mut().value = value;
        Ok(())
    }

    /// Check the held value against the cell's constraints
    pub fn validate(&self) -> Result<()> {
        let value = self.get();
        self.validate_value(&value)
    }

    /// Convert the held value to `annotation` in place
    pub fn convert(&self, annotation: &Annotation, coercer: &dyn Coerce) -> Result<()> {
        let converted = coercer.coerce(self.get(), annotation)?;
        self.set(converted)
    }

    /// Whether two handles refer to the same cell
    pub fn ptr_eq(&self, other: &Variable) -> bool {
        Rc::ptr_eq(&self.slot, &other.slot)
    }

    /// Declared type, if any
    pub fn annotation(&self) -> Option<Annotation> {
        self.slot.borrow().annotation.clone()
    }

    /// Allowed values, if restricted
    pub fn choices(&self) -> Option<Vec<Value>> {
        self.slot.borrow().choices.clone()
    }

    /// Whether null is rejected
    pub fn is_required(&self) -> bool {
        self.slot.borrow().required
    }

    /// Description, if any
    pub fn help(&self) -> Option<String> {
        self.slot.borrow().help.clone()
    }

    /// Check `value` against the cell's constraints without storing it
    pub fn validate_value(&self, value: &Value) -> Result<()> {
        let (annotation, choices, validator, required) = {
            let slot = self.slot.borrow();
            (
                slot.annotation.clone(),
                slot.choices.clone(),
                slot.validator.clone(),
                slot.required,
            )
        };

        if required && value.is_null() {
            return Err(Error::validation("Value is required but got null"));
        }
        if let Some(annotation) = annotation {
            if !value.is_null() && !annotation.conforms(value) {
                return Err(Error::type_mismatch(
                    annotation.to_string(),
                    format!("{} ({})", value.type_name(), value),
                ));
            }
        }
        if let Some(choices) = choices {
            if !choices.contains(value) {
                let allowed: Vec<String> = choices.iter().map(Value::to_string).collect();
                return Err(Error::validation(format!(
                    "Value {} is not in choices [{}]",
                    value,
                    allowed.join(", ")
                )));
            }
        }
        if let Some(validator) = validator {
            if !validator(value) {
                return Err(Error::validation(format!("Value {} is not valid", value)));
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.slot.try_borrow() {
            Ok(slot) => f.debug_tuple("Variable").field(&slot.value).finish(),
            Err(_) => f.write_str("Variable(<borrowed>)"),
        }
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.with_value(|v| write!(f, "{}", v))
    }
}

impl PartialEq for Variable {
    fn eq(&self, other: &Variable) -> bool {
        self.ptr_eq(other) || self.get() == other.get()
    }
}

impl Serialize for Variable {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.slot.borrow().value.serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::StandardCoercer;
    use crate::error::ErrorKind;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_clone_shares_cell() {
        let a = Variable::new(1);
        let b = a.clone();
        b.set(2).unwrap();
        assert_eq!(a.get(), Value::Integer(2));
        assert!(a.ptr_eq(&b));
    }

    #[test]
    fn test_set_unwraps_cell_argument() {
        let a = Variable::new(1);
        let b = Variable::new(7);
        a.set(b.clone()).unwrap();
        assert_eq!(a.get(), Value::Integer(7));
        assert!(!a.get().is_variable());

        b.set(8).unwrap();
        assert_eq!(a.get(), Value::Integer(7));
    }

    #[test]
    fn test_new_from_cell_copies_value() {
        let a = Variable::new(3);
        let b = Variable::new(a.clone());
        assert!(!b.ptr_eq(&a));
        assert_eq!(b.get(), Value::Integer(3));
    }

    #[test]
    fn test_type_constraint() {
        let v = Variable::new(1).with_type(Annotation::Integer);
        let err = v.set("one").unwrap_err();
        assert_eq!(err.kind, ErrorKind::TypeMismatch);
        assert_eq!(v.get(), Value::Integer(1));
    }

    #[test]
    fn test_choices_constraint() {
        let v = Variable::new("adam").with_choices(["adam", "sgd"]);
        v.set("sgd").unwrap();
        let err = v.set("rmsprop").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
        assert!(err.to_string().contains("not in choices [adam, sgd]"));
    }

    #[test]
    fn test_validator_constraint() {
        let v = Variable::new(0.1).with_validator(|v| v.as_f64().is_some_and(|x| x > 0.0));
        v.set(0.5).unwrap();
        assert_eq!(v.set(-1.0).unwrap_err().kind, ErrorKind::Validation);
    }

    #[test]
    fn test_required_rejects_null() {
        let v = Variable::new(Value::Null).required(true);
        assert_eq!(v.validate().unwrap_err().kind, ErrorKind::Validation);
        assert_eq!(v.set(Value::Null).unwrap_err().kind, ErrorKind::Validation);
        v.set(1).unwrap();
        v.validate().unwrap();
    }

    #[test]
    fn test_convert_in_place() {
        let v = Variable::new("64");
        let alias = v.clone();
        v.convert(&Annotation::Integer, &StandardCoercer).unwrap();
        assert_eq!(alias.get(), Value::Integer(64));
    }

    #[test]
    fn test_metadata_accessors() {
        let v = Variable::new(1)
            .with_type(Annotation::Integer)
            .with_help("number of epochs")
            .required(true);
        assert_eq!(v.annotation(), Some(Annotation::Integer));
        assert_eq!(v.help().as_deref(), Some("number of epochs"));
        assert!(v.is_required());
        assert_eq!(v.choices(), None);
    }

    #[test]
    fn test_debug_and_display() {
        let v = Variable::new("x");
        assert_eq!(format!("{:?}", v), "Variable(String(\"x\"))");
        assert_eq!(v.to_string(), "x");
    }
}
