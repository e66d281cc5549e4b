//! `CRDTCounter<T>` (C5): a numeric accumulator. Concurrent increases
//! commute, so no conflict resolution is needed beyond summing.

use crate::error::{Error, Result};
use crate::primitive::Primitive;
use crate::time::TimeTicket;

#[derive(Clone, Debug)]
pub struct CRDTCounter {
    created_at: TimeTicket,
    pub value: Primitive,
}

impl CRDTCounter {
    pub fn new(created_at: TimeTicket, value: Primitive) -> Result<Self> {
        if !value.is_numeric() {
            return Err(Error::InvalidArgument(format!(
                "counter value must be numeric, got {}",
                value.type_name()
            )));
        }
        Ok(Self { created_at, value })
    }

    pub fn created_at(&self) -> TimeTicket {
        self.created_at
    }

    /// Atomic add; rejects non-numeric or mismatched-tag operands.
    pub fn increase(&mut self, delta: &Primitive) -> Result<()> {
        if !delta.is_numeric() {
            return Err(Error::InvalidArgument(format!(
                "cannot increase counter by non-numeric value {}",
                delta.type_name()
            )));
        }
        if !self.value.checked_add_assign(delta) {
            return Err(Error::InvalidArgument(
                "counter increase type mismatch".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::ActorID;

    fn ticket() -> TimeTicket {
        TimeTicket::new(1, 0, ActorID(1))
    }

    #[test]
    fn concurrent_increases_commute() {
        let mut a = CRDTCounter::new(ticket(), Primitive::Int64(0)).unwrap();
        a.increase(&Primitive::Int64(3)).unwrap();
        a.increase(&Primitive::Int64(5)).unwrap();
        assert_eq!(a.value, Primitive::Int64(8));
    }

    #[test]
    fn rejects_non_numeric_construction() {
        assert!(CRDTCounter::new(ticket(), Primitive::Str("x".into())).is_err());
    }

    #[test]
    fn rejects_non_numeric_increase() {
        let mut a = CRDTCounter::new(ticket(), Primitive::Int32(1)).unwrap();
        assert!(a.increase(&Primitive::Str("x".into())).is_err());
    }
}
