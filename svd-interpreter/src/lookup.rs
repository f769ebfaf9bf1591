//! Register lookups on a parsed [`Device`]

use std::str::FromStr;

use itertools::Itertools;

use crate::{
    error::LookupError,
    model::{Device, Peripheral, Register},
    util::parse_int_literal,
};

/// A register together with the peripheral it belongs to
#[derive(Clone, Copy, Debug)]
pub struct RegisterRef<'a> {
    pub peripheral: &'a Peripheral,
    pub register: &'a Register,
}

impl<'a> RegisterRef<'a> {
    /// Get register's absolute memory address
    pub fn address(&self) -> u64 {
        // Overflow is ruled out when the device is parsed
        self.peripheral
            .base_address
            .wrapping_add(self.register.offset)
    }

    /// E.g., `TIMER0.CTRL`
    pub fn path(&self) -> String {
        format!("{}.{}", self.peripheral.name, self.register.name)
    }
}

/// How a user refers to a register
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RegisterId {
    /// Absolute memory address, e.g., `0x40000000`
    Address(u64),
    /// `PERIPHERAL.REGISTER`, e.g., `TIMER0.CTRL`
    Path {
        peripheral: String,
        register: String,
    },
}

impl FromStr for RegisterId {
    type Err = LookupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(address) = parse_int_literal(s) {
            return Ok(Self::Address(address));
        }
        match s.split_once('.') {
            Some((peripheral, register)) => Ok(Self::Path {
                peripheral: peripheral.to_owned(),
                register: register.to_owned(),
            }),
            None => Err(LookupError::InvalidRegisterId(s.to_owned())),
        }
    }
}

impl Device {
    /// Find a peripheral by its exact name
    pub fn peripheral(&self, name: &str) -> Option<&Peripheral> {
        self.peripherals.iter().find(|p| p.name == name)
    }

    /// All registers of all peripherals in input order
    pub fn registers(&self) -> impl Iterator<Item = RegisterRef<'_>> {
        self.peripherals.iter().flat_map(|peripheral| {
            peripheral
                .registers
                .iter()
                .map(move |register| RegisterRef {
                    peripheral,
                    register,
                })
        })
    }

    /// Find a register by the exact names of its peripheral and itself
    pub fn find_register(&self, peripheral: &str, register: &str) -> Option<RegisterRef<'_>> {
        let peripheral = self.peripheral(peripheral)?;
        let register = peripheral.register(register)?;
        Some(RegisterRef {
            peripheral,
            register,
        })
    }

    /// Registers whose name contains `pattern`, ignoring case
    pub fn search_registers(&self, pattern: &str) -> Vec<RegisterRef<'_>> {
        let pattern = pattern.to_lowercase();
        self.registers()
            .filter(|r| r.register.name.to_lowercase().contains(&pattern))
            .collect()
    }

    /// Registers located exactly at `address`
    pub fn registers_at(&self, address: u64) -> Vec<RegisterRef<'_>> {
        self.registers()
            .filter(|r| r.address() == address)
            .collect()
    }

    /// Registers located between `start` and `end` inclusive, ordered by address
    ///
    /// Registers sharing an address keep their input order.
    pub fn registers_in_range(
        &self,
        start: u64,
        end: u64,
    ) -> Result<Vec<RegisterRef<'_>>, LookupError> {
        if start > end {
            return Err(LookupError::InvertedRange { start, end });
        }
        Ok(self
            .registers()
            .filter(|r| (start..=end).contains(&r.address()))
            .sorted_by_key(RegisterRef::address)
            .collect())
    }

    /// Find a register by [`RegisterId`]
    ///
    /// When several registers share an address, the first one in input order is returned.
    pub fn lookup(&self, id: &RegisterId) -> Option<RegisterRef<'_>> {
        match id {
            RegisterId::Address(address) => self.registers().find(|r| r.address() == *address),
            RegisterId::Path {
                peripheral,
                register,
            } => self.find_register(peripheral, register),
        }
    }

    /// Find a register by address or `PERIPHERAL.REGISTER` as typed by a user
    pub fn resolve(&self, identifier: &str) -> Option<RegisterRef<'_>> {
        identifier
            .parse::<RegisterId>()
            .ok()
            .and_then(|id| self.lookup(&id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_data;

    fn paths(refs: &[RegisterRef]) -> Vec<String> {
        refs.iter().map(RegisterRef::path).collect()
    }

    #[test]
    fn find_register_is_exact() {
        let device = test_data::device();
        let reg = device.find_register("TIMER0", "CTRL").unwrap();
        assert_eq!(reg.address(), 0x4000_0000);
        assert!(device.find_register("TIMER0", "ctrl").is_none());
        assert!(device.find_register("TIMER9", "CTRL").is_none());
    }

    #[test]
    fn search_ignores_case_and_keeps_input_order() {
        let device = test_data::device();
        assert_eq!(
            paths(&device.search_registers("ctr")),
            ["TIMER0.CTRL", "TIMER1.CTRL"]
        );
        assert_eq!(
            paths(&device.search_registers("fifo")),
            ["UART0.TX_FIFO", "UART0.RX_FIFO"]
        );
        assert!(device.search_registers("nothing").is_empty());
    }

    #[test]
    fn registers_at_address() {
        let device = test_data::device();
        assert_eq!(paths(&device.registers_at(0x4000_1004)), ["TIMER1.STATUS"]);
        assert_eq!(paths(&device.registers_at(0x4000_2034)), ["UART0.CH1.CFG"]);
        assert!(device.registers_at(0x4000_0002).is_empty());
    }

    #[test]
    fn range_is_inclusive_and_sorted() {
        let device = test_data::device();
        let found = device.registers_in_range(0x4000_2000, 0x4000_2024).unwrap();
        assert_eq!(
            paths(&found),
            [
                "UART0.DATA",
                "UART0.TX_FIFO",
                "UART0.RX_FIFO",
                "UART0.CH0.CFG"
            ]
        );
        assert_eq!(
            device.registers_in_range(2, 1).unwrap_err(),
            LookupError::InvertedRange { start: 2, end: 1 }
        );
        assert!(device.registers_in_range(0, 0xff).unwrap().is_empty());
    }

    #[test]
    fn resolve_by_address_or_path() {
        let device = test_data::device();
        assert_eq!(device.resolve("0x40000004").unwrap().path(), "TIMER0.STATUS");
        assert_eq!(device.resolve("1073741824").unwrap().path(), "TIMER0.CTRL");
        assert_eq!(device.resolve("UART0.CH0.CFG").unwrap().address(), 0x4000_2024);
        assert!(device.resolve("CTRL").is_none());
        assert!(device.resolve("0x1").is_none());
    }

    #[test]
    fn register_id_parses() {
        assert_eq!("0x10".parse(), Ok(RegisterId::Address(0x10)));
        assert_eq!(
            "A.B.C".parse(),
            Ok(RegisterId::Path {
                peripheral: "A".to_owned(),
                register: "B.C".to_owned()
            })
        );
        assert!("CTRL".parse::<RegisterId>().is_err());
    }
}
