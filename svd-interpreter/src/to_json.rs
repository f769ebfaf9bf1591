//! JSON documents describing devices, registers and codec results
//!
//! Objects are built with [`JsonValue`] so that keys keep the order in which they are inserted.

use json::JsonValue;

use crate::{
    codec::{format_binary, DecodedField, EnumMatch, Encoding},
    lookup::RegisterRef,
    model::{hex, Access, Device, Field, Peripheral},
};

/// Pretty-print a document with two-space indentation
pub fn pretty(value: &JsonValue) -> String {
    value.pretty(2)
}

fn access_str(access: Option<Access>) -> Option<&'static str> {
    access.map(<&'static str>::from)
}

pub fn device_info(device: &Device) -> JsonValue {
    let mut cpu = JsonValue::new_object();
    if let Some(c) = &device.cpu {
        for (key, value) in c.properties() {
            cpu[key] = value.into();
        }
    }

    let mut data = JsonValue::new_object();
    data["name"] = device.name.as_str().into();
    data["vendor"] = device.vendor.as_str().into();
    data["version"] = device.version.as_str().into();
    data["description"] = device.description.as_str().into();
    data["cpu"] = cpu;
    data["address_unit_bits"] = device.address_unit_bits.into();
    data["width"] = device.width.into();
    data
}

pub fn peripherals(device: &Device) -> JsonValue {
    device
        .peripherals
        .iter()
        .map(|p| {
            let mut data = JsonValue::new_object();
            data["name"] = p.name.as_str().into();
            data["description"] = p.description.as_str().into();
            data["base_address"] = hex(p.base_address).into();
            data["group_name"] = p.group_name.as_deref().unwrap_or_default().into();
            data
        })
        .collect::<Vec<_>>()
        .into()
}

fn enum_values(field: &Field) -> JsonValue {
    if !field.has_enumerated_values() {
        return JsonValue::Null;
    }
    let mut values = JsonValue::new_object();
    for ev in &field.enumerated_values {
        values[ev.label()] = ev.to_string().into();
    }
    values
}

/// Full description of a register and its fields
pub fn register(r: &RegisterRef) -> JsonValue {
    let reg = r.register;
    let fields = reg
        .fields
        .iter()
        .map(|f| {
            let mut data = JsonValue::new_object();
            data["name"] = f.name.as_str().into();
            data["bits"] = f.bit_range.bits_str().into();
            data["width"] = f.bit_range.width.into();
            data["access"] = access_str(f.access).into();
            data["description"] = f.description.as_str().into();
            data["enum_values"] = enum_values(f);
            data
        })
        .collect::<Vec<_>>();

    let mut data = JsonValue::new_object();
    data["peripheral"] = r.peripheral.name.as_str().into();
    data["peripheral_base"] = hex(r.peripheral.base_address).into();
    data["register"] = reg.name.as_str().into();
    data["offset"] = hex(reg.offset).into();
    data["absolute_address"] = hex(r.address()).into();
    data["size"] = reg.size.into();
    data["access"] = access_str(reg.access).into();
    data["reset_value"] = reg.reset_value.map(hex).into();
    data["description"] = reg.description.as_str().into();
    data["fields"] = fields.into();
    data
}

pub fn search_results(results: &[RegisterRef]) -> JsonValue {
    results
        .iter()
        .map(|r| {
            let mut data = JsonValue::new_object();
            data["peripheral"] = r.peripheral.name.as_str().into();
            data["register"] = r.register.name.as_str().into();
            data
        })
        .collect::<Vec<_>>()
        .into()
}

/// Location summary shared by the address queries
fn located_register(r: &RegisterRef) -> JsonValue {
    let mut data = JsonValue::new_object();
    data["address"] = hex(r.address()).into();
    data["peripheral"] = r.peripheral.name.as_str().into();
    data["peripheral_base"] = hex(r.peripheral.base_address).into();
    data["register"] = r.register.name.as_str().into();
    data["register_offset"] = hex(r.register.offset).into();
    data["description"] = r.register.description.as_str().into();
    data["size"] = r.register.size.into();
    data["access"] = access_str(r.register.access).into();
    data
}

pub fn registers_at(address: u64, matches: &[RegisterRef]) -> JsonValue {
    if matches.is_empty() {
        let mut data = JsonValue::new_object();
        data["error"] = "No register found at this address".into();
        data["address"] = hex(address).into();
        return data;
    }
    matches
        .iter()
        .map(|r| {
            let mut data = located_register(r);
            data["reset_value"] = r.register.reset_value.map(hex).into();
            data
        })
        .collect::<Vec<_>>()
        .into()
}

pub fn registers_in_range(start: u64, end: u64, matches: &[RegisterRef]) -> JsonValue {
    let mut data = JsonValue::new_object();
    if matches.is_empty() {
        data["error"] = "No registers found in this range".into();
        data["start"] = hex(start).into();
        data["end"] = hex(end).into();
        return data;
    }
    let mut range = JsonValue::new_object();
    range["start"] = hex(start).into();
    range["end"] = hex(end).into();
    let size = (u128::from(end) + 1).saturating_sub(u128::from(start));
    range["size"] = format!("{size:#x}").into();

    data["range"] = range;
    data["count"] = matches.len().into();
    data["registers"] = matches
        .iter()
        .map(located_register)
        .collect::<Vec<_>>()
        .into();
    data
}

/// Base address of a peripheral and the addresses of all its registers
pub fn peripheral_addresses(peripheral: &Peripheral) -> JsonValue {
    let registers = peripheral
        .registers
        .iter()
        .map(|reg| {
            let mut data = JsonValue::new_object();
            data["name"] = reg.name.as_str().into();
            data["offset"] = hex(reg.offset).into();
            data["absolute_address"] = hex(peripheral.base_address.wrapping_add(reg.offset)).into();
            data
        })
        .collect::<Vec<_>>();

    let mut data = JsonValue::new_object();
    data["peripheral"] = peripheral.name.as_str().into();
    data["base_address"] = hex(peripheral.base_address).into();
    data["registers"] = registers.into();
    data
}

pub fn register_address(r: &RegisterRef) -> JsonValue {
    let mut data = JsonValue::new_object();
    data["peripheral"] = r.peripheral.name.as_str().into();
    data["peripheral_base"] = hex(r.peripheral.base_address).into();
    data["register"] = r.register.name.as_str().into();
    data["register_offset"] = hex(r.register.offset).into();
    data["absolute_address"] = hex(r.address()).into();
    data
}

fn decoded_field(d: &DecodedField) -> JsonValue {
    let mut data = JsonValue::new_object();
    data["name"] = d.field.name.as_str().into();
    data["bit_range"] = d.field.bit_range.to_string().into();
    data["value"] = d.value.into();
    data["value_hex"] = hex(d.value).into();
    data["value_binary"] = format_binary(d.value, d.field.bit_range.width).into();
    data["description"] = d.field.description.as_str().into();
    match d.enum_match {
        EnumMatch::NotEnumerated => {}
        EnumMatch::Matched(ev) => data["enum_match"] = ev.to_string().into(),
        EnumMatch::Unmatched => {
            data["enum_match"] = JsonValue::Null;
            data["warning"] = DecodedField::UNMATCHED_WARNING.into();
        }
    }
    data
}

pub fn decoded(r: &RegisterRef, value: u64, fields: &[DecodedField]) -> JsonValue {
    let mut register = JsonValue::new_object();
    register["peripheral"] = r.peripheral.name.as_str().into();
    register["name"] = r.register.name.as_str().into();
    register["address"] = hex(r.address()).into();
    register["size"] = r.register.size.into();

    let mut val = JsonValue::new_object();
    val["decimal"] = value.into();
    val["hex"] = hex(value).into();
    val["binary"] = format_binary(value, r.register.size).into();

    let mut data = JsonValue::new_object();
    data["register"] = register;
    data["value"] = val;
    data["fields"] = fields.iter().map(decoded_field).collect::<Vec<_>>().into();
    data
}

pub fn encoded(r: &RegisterRef, encoding: &Encoding) -> JsonValue {
    let mut register = JsonValue::new_object();
    register["peripheral"] = r.peripheral.name.as_str().into();
    register["name"] = r.register.name.as_str().into();
    register["address"] = hex(r.address()).into();

    let mut base = JsonValue::new_object();
    base["decimal"] = encoding.base.into();
    base["hex"] = hex(encoding.base).into();

    let mut result = JsonValue::new_object();
    result["decimal"] = encoding.result.into();
    result["hex"] = hex(encoding.result).into();
    result["binary"] = format_binary(encoding.result, r.register.size).into();

    let applied = encoding
        .applied
        .iter()
        .map(|a| {
            let mut data = JsonValue::new_object();
            data["name"] = a.field.name.as_str().into();
            data["value"] = a.value.into();
            data["value_hex"] = hex(a.value).into();
            data["bit_range"] = a.field.bit_range.to_string().into();
            data["enum_used"] = a.enum_used.into();
            data
        })
        .collect::<Vec<_>>();

    let mut data = JsonValue::new_object();
    data["register"] = register;
    data["base_value"] = base;
    data["result_value"] = result;
    data["applied_fields"] = applied.into();
    data["errors"] = encoding
        .errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .into();
    data["warnings"] = encoding.warnings.clone().into();
    data["valid"] = encoding.is_valid().into();
    data
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{codec, test_data};

    fn keys(value: &JsonValue) -> Vec<&str> {
        value.entries().map(|(k, _)| k).collect()
    }

    #[test]
    fn device_info_keeps_key_order() {
        let device = test_data::device();
        let doc = device_info(&device);
        assert_eq!(
            keys(&doc),
            [
                "name",
                "vendor",
                "version",
                "description",
                "cpu",
                "address_unit_bits",
                "width"
            ]
        );
        assert_eq!(doc["cpu"]["nvic_prio_bits"], "3");
        assert_eq!(doc["width"], 32);
    }

    #[test]
    fn peripherals_use_empty_group_name() {
        let device = test_data::device();
        let doc = peripherals(&device);
        assert_eq!(doc.len(), 4);
        assert_eq!(doc[0]["base_address"], "0x40000000");
        assert_eq!(doc[0]["group_name"], "TIMER");
        assert_eq!(doc[3]["group_name"], "");
    }

    #[test]
    fn register_document() {
        let device = test_data::device();
        let r = device.find_register("TIMER0", "CTRL").unwrap();
        let doc = register(&r);
        assert_eq!(doc["reset_value"], "0x10");
        assert_eq!(doc["access"], "read-write");
        assert_eq!(doc["fields"][1]["bits"], "2:1");
        assert_eq!(doc["fields"][1]["enum_values"]["0"], "ONESHOT: Stop at zero");
        assert_eq!(doc["fields"][1]["enum_values"]["0x2"], "CONTINUOUS");
        assert!(doc["fields"][0]["enum_values"].is_null());

        let status = device.find_register("TIMER0", "COUNT").unwrap();
        assert!(register(&status)["reset_value"].is_null());
    }

    #[test]
    fn empty_address_queries_report_errors() {
        let doc = registers_at(0x10, &[]);
        assert_eq!(doc["error"], "No register found at this address");
        assert_eq!(doc["address"], "0x10");

        let doc = registers_in_range(0x10, 0x20, &[]);
        assert_eq!(keys(&doc), ["error", "start", "end"]);
    }

    #[test]
    fn range_document() {
        let device = test_data::device();
        let found = device.registers_in_range(0x4000_0000, 0x4000_00ff).unwrap();
        let doc = registers_in_range(0x4000_0000, 0x4000_00ff, &found);
        assert_eq!(doc["range"]["size"], "0x100");
        assert_eq!(doc["count"], 3);
        assert_eq!(doc["registers"][2]["register"], "COUNT");
        assert!(!doc["registers"][2].has_key("reset_value"));

        let everything = device.registers_in_range(0, u64::MAX).unwrap();
        let doc = registers_in_range(0, u64::MAX, &everything);
        assert_eq!(doc["range"]["end"], "0xffffffffffffffff");
        assert_eq!(doc["range"]["size"], "0x10000000000000000");
    }

    #[test]
    fn decoded_marks_unmatched_enumerations() {
        let device = test_data::device();
        let r = device.find_register("TIMER0", "CTRL").unwrap();
        let fields = codec::decode(r.register, 0b110);
        let doc = decoded(&r, 0b110, &fields);
        assert_eq!(doc["value"]["binary"], "0000_0000_0000_0000_0000_0000_0000_0110");
        let mode = &doc["fields"][1];
        assert_eq!(mode["bit_range"], "[2:1]");
        assert!(mode["enum_match"].is_null());
        assert_eq!(mode["warning"], "Value does not match any enumerated value");
        assert!(!doc["fields"][0].has_key("enum_match"));
    }

    #[test]
    fn encoded_reports_validity() {
        let device = test_data::device();
        let r = device.find_register("TIMER0", "CTRL").unwrap();
        let assignments = [("MODE".to_owned(), "PERIODIC".to_owned())];
        let enc = codec::encode(r.register, codec::BaseValue::default(), &assignments);
        let doc = encoded(&r, &enc);
        assert_eq!(doc["result_value"]["hex"], "0x2");
        assert_eq!(doc["applied_fields"][0]["enum_used"], "PERIODIC");
        assert_eq!(doc["valid"], true);
        assert!(pretty(&doc).starts_with("{\n  \"register\": {"));
    }
}
