//! Human-readable reports for each subcommand

use std::{collections::BTreeMap, io};

use svd_interpreter::{
    format_binary, hex, DecodedField, Device, EnumMatch, Encoding, Field, Peripheral,
    RegisterRef,
};

const RULE_WIDTH: usize = 80;

fn heavy_rule() -> String {
    "=".repeat(RULE_WIDTH)
}

fn light_rule() -> String {
    "-".repeat(RULE_WIDTH)
}

/// Shorten `s` to `max` characters, marking the cut with `...`
fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        format!("{}...", s.chars().take(max).collect::<String>())
    } else {
        s.to_owned()
    }
}

/// `nvic_prio_bits` -> `Nvic Prio Bits`
fn title_case(key: &str) -> String {
    key.split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// E.g., `(read-write)`, or nothing if access is unknown
fn access_tag(access: Option<svd_interpreter::Access>) -> String {
    access.map(|a| format!("({a})")).unwrap_or_default()
}

fn fields_by_offset_descending(fields: &[Field]) -> Vec<&Field> {
    let mut fields = fields.iter().collect::<Vec<_>>();
    fields.sort_by_key(|f| std::cmp::Reverse(f.bit_range.offset));
    fields
}

pub fn device_info(out: &mut impl io::Write, device: &Device) -> io::Result<()> {
    writeln!(out, "\n{}", heavy_rule())?;
    writeln!(out, "Device Information")?;
    writeln!(out, "{}", heavy_rule())?;
    writeln!(out, "Name:              {}", device.name)?;
    writeln!(out, "Vendor:            {}", device.vendor)?;
    writeln!(out, "Version:           {}", device.version)?;
    writeln!(out, "Description:       {}", device.description)?;
    writeln!(out, "Address Unit Bits: {}", device.address_unit_bits)?;
    writeln!(out, "Default Width:     {} bits", device.width)?;

    if let Some(cpu) = &device.cpu {
        writeln!(out, "\nCPU:")?;
        writeln!(out, "{}", light_rule())?;
        for (key, value) in cpu.properties() {
            if !value.is_empty() {
                writeln!(out, "  {:<20}: {value}", title_case(key))?;
            }
        }
    }
    writeln!(out)
}

/// Peripherals grouped by `groupName`, ungrouped peripherals first
pub fn peripherals(out: &mut impl io::Write, device: &Device) -> io::Result<()> {
    writeln!(out, "\n{}", heavy_rule())?;
    writeln!(out, "Device: {}", device.name)?;
    writeln!(out, "Peripherals: {}", device.peripherals.len())?;
    writeln!(out, "{}\n", heavy_rule())?;

    let mut groups: BTreeMap<&str, Vec<&Peripheral>> = BTreeMap::new();
    for p in &device.peripherals {
        groups
            .entry(p.group_name.as_deref().unwrap_or_default())
            .or_default()
            .push(p);
    }

    for (group, members) in groups {
        if !group.is_empty() {
            writeln!(out, "\n{group}:")?;
            writeln!(out, "{}", light_rule())?;
        }
        for p in members {
            writeln!(
                out,
                "  {:<20} {:<12} {}",
                p.name,
                hex(p.base_address),
                truncate(&p.description, 45)
            )?;
        }
    }
    writeln!(out)
}

fn write_field_details(out: &mut impl io::Write, field: &Field) -> io::Result<()> {
    writeln!(
        out,
        "  {:<8} {:<20} {}",
        field.bit_range.to_string(),
        field.name,
        access_tag(field.access)
    )?;
    if !field.description.is_empty() {
        writeln!(out, "         {}", field.description)?;
    }
    if field.has_enumerated_values() {
        writeln!(out, "         Possible values:")?;
        for ev in &field.enumerated_values {
            writeln!(out, "           {}: {ev}", ev.label())?;
        }
    }
    writeln!(out)
}

pub fn register(out: &mut impl io::Write, r: &RegisterRef) -> io::Result<()> {
    let reg = r.register;
    writeln!(out, "\n{}", heavy_rule())?;
    writeln!(out, "Register: {}", r.path())?;
    writeln!(out, "{}", heavy_rule())?;
    writeln!(out, "Peripheral Base:  {}", hex(r.peripheral.base_address))?;
    writeln!(out, "Register Offset:  {}", hex(reg.offset))?;
    writeln!(out, "Absolute Address: {}", hex(r.address()))?;
    writeln!(out, "Size:             {} bits", reg.size)?;
    if let Some(access) = reg.access {
        writeln!(out, "Access:           {access}")?;
    }
    if let Some(reset_value) = reg.reset_value {
        writeln!(out, "Reset Value:      {}", hex(reset_value))?;
    }
    writeln!(out, "\nDescription:")?;
    writeln!(out, "  {}\n", reg.description)?;

    if reg.fields.is_empty() {
        writeln!(out, "No bit field definitions available.\n")?;
    } else {
        writeln!(out, "Bit Fields:")?;
        writeln!(out, "{}", light_rule())?;
        for field in fields_by_offset_descending(&reg.fields) {
            write_field_details(out, field)?;
        }
    }
    Ok(())
}

pub fn search_results(
    out: &mut impl io::Write,
    pattern: &str,
    results: &[RegisterRef],
) -> io::Result<()> {
    writeln!(out, "\n{}", heavy_rule())?;
    writeln!(
        out,
        "Found {} register(s) matching '{pattern}'",
        results.len()
    )?;
    writeln!(out, "{}\n", heavy_rule())?;
    for r in results {
        writeln!(out, "  {}", r.path())?;
    }
    writeln!(out)
}

pub fn registers_at(
    out: &mut impl io::Write,
    address: u64,
    matches: &[RegisterRef],
) -> io::Result<()> {
    if matches.is_empty() {
        return writeln!(out, "\nNo register found at address {}", hex(address));
    }

    writeln!(out, "\n{}", heavy_rule())?;
    writeln!(out, "Register(s) at address {}", hex(address))?;
    writeln!(out, "{}", heavy_rule())?;
    for r in matches {
        let reg = r.register;
        writeln!(out, "\nPeripheral:       {}", r.peripheral.name)?;
        writeln!(out, "  Base Address:   {}", hex(r.peripheral.base_address))?;
        writeln!(out, "\nRegister:         {}", reg.name)?;
        writeln!(out, "  Offset:         {}", hex(reg.offset))?;
        writeln!(out, "  Absolute Addr:  {}", hex(r.address()))?;
        writeln!(out, "  Size:           {} bits", reg.size)?;
        if let Some(access) = reg.access {
            writeln!(out, "  Access:         {access}")?;
        }
        if let Some(reset_value) = reg.reset_value {
            writeln!(out, "  Reset Value:    {}", hex(reset_value))?;
        }
        writeln!(out, "\nDescription:")?;
        writeln!(out, "  {}", reg.description)?;

        if !reg.fields.is_empty() {
            writeln!(out, "\nBit Fields:")?;
            writeln!(out, "{}", light_rule())?;
            for field in fields_by_offset_descending(&reg.fields) {
                writeln!(out, "  {:<8} {}", field.bit_range.to_string(), field.name)?;
            }
        }
        writeln!(out)?;
    }
    Ok(())
}

/// Registers in an address range, with a header for each run of the same peripheral
pub fn registers_in_range(
    out: &mut impl io::Write,
    start: u64,
    end: u64,
    matches: &[RegisterRef],
) -> io::Result<()> {
    if matches.is_empty() {
        return writeln!(
            out,
            "\nNo registers found in range {} - {}",
            hex(start),
            hex(end)
        );
    }

    writeln!(out, "\n{}", heavy_rule())?;
    writeln!(out, "Registers in range {} - {}", hex(start), hex(end))?;
    writeln!(out, "Found {} register(s)", matches.len())?;
    writeln!(out, "{}\n", heavy_rule())?;

    let mut current: Option<&str> = None;
    for r in matches {
        let peripheral = r.peripheral.name.as_str();
        if current != Some(peripheral) {
            if current.is_some() {
                writeln!(out)?;
            }
            writeln!(
                out,
                "{peripheral} (Base: {})",
                hex(r.peripheral.base_address)
            )?;
            writeln!(out, "{}", light_rule())?;
            current = Some(peripheral);
        }
        writeln!(
            out,
            "  {:<12} {:<20} {:<15} {}",
            hex(r.address()),
            r.register.name,
            access_tag(r.register.access),
            truncate(&r.register.description, 30)
        )?;
    }
    writeln!(out)
}

pub fn peripheral_addresses(out: &mut impl io::Write, peripheral: &Peripheral) -> io::Result<()> {
    writeln!(out, "\n{}", peripheral.name)?;
    writeln!(out, "{}", heavy_rule())?;
    writeln!(out, "Base Address: {}", hex(peripheral.base_address))?;
    writeln!(out, "\nRegisters:")?;
    writeln!(out, "{}", light_rule())?;
    for reg in &peripheral.registers {
        writeln!(
            out,
            "  {:<25} {:<10} -> {}",
            reg.name,
            hex(reg.offset),
            hex(peripheral.base_address.wrapping_add(reg.offset))
        )?;
    }
    writeln!(out)
}

pub fn register_address(out: &mut impl io::Write, r: &RegisterRef) -> io::Result<()> {
    writeln!(out, "\n{}", r.path())?;
    writeln!(out, "{}", heavy_rule())?;
    writeln!(out, "Peripheral Base:  {}", hex(r.peripheral.base_address))?;
    writeln!(out, "Register Offset:  {}", hex(r.register.offset))?;
    writeln!(out, "Absolute Address: {}", hex(r.address()))?;
    writeln!(out)
}

fn register_banner(out: &mut impl io::Write, r: &RegisterRef) -> io::Result<()> {
    writeln!(out, "\n{}", heavy_rule())?;
    writeln!(out, "Register: {}", r.path())?;
    writeln!(out, "Address:  {}", hex(r.address()))?;
    writeln!(out, "{}", heavy_rule())
}

pub fn decoded(
    out: &mut impl io::Write,
    r: &RegisterRef,
    value: u64,
    fields: &[DecodedField],
) -> io::Result<()> {
    register_banner(out, r)?;
    writeln!(out, "\nValue:    {value} (decimal)")?;
    writeln!(out, "          {} (hex)", hex(value))?;
    writeln!(
        out,
        "          0b{} (binary)",
        format_binary(value, r.register.size)
    )?;
    writeln!(out, "\nBit Field Breakdown:")?;
    writeln!(out, "{}", light_rule())?;

    if fields.is_empty() {
        writeln!(out, "  No bit field definitions available.")?;
    }
    for d in fields {
        let field = d.field;
        writeln!(
            out,
            "\n  {:<8} {:<20} {:<10} {:<10}",
            field.bit_range.to_string(),
            field.name,
            format!("= {}", d.value),
            format!("({})", hex(d.value))
        )?;
        writeln!(
            out,
            "         Binary: {}",
            format_binary(d.value, field.bit_range.width)
        )?;
        if !field.description.is_empty() {
            writeln!(out, "         {}", field.description)?;
        }
        match d.enum_match {
            EnumMatch::NotEnumerated => {}
            EnumMatch::Matched(ev) => writeln!(out, "         → {ev}")?,
            EnumMatch::Unmatched => {
                writeln!(out, "         ⚠ {}", DecodedField::UNMATCHED_WARNING)?
            }
        }
    }
    writeln!(out)
}

/// Report an encoding result
///
/// For an invalid encoding only the errors are listed.
pub fn encoded(out: &mut impl io::Write, r: &RegisterRef, encoding: &Encoding) -> io::Result<()> {
    register_banner(out, r)?;

    if !encoding.is_valid() {
        writeln!(out, "\n❌ ERRORS:")?;
        for error in &encoding.errors {
            writeln!(out, "  • {error}")?;
        }
        return writeln!(out, "\nConfiguration is INVALID. Please fix errors above.");
    }

    writeln!(
        out,
        "\nBase Value:   {} ({})",
        encoding.base,
        hex(encoding.base)
    )?;
    writeln!(
        out,
        "Result Value: {} ({})",
        encoding.result,
        hex(encoding.result)
    )?;
    writeln!(
        out,
        "Binary:       0b{}",
        format_binary(encoding.result, r.register.size)
    )?;

    if !encoding.applied.is_empty() {
        writeln!(out, "\nApplied Fields:")?;
        writeln!(out, "{}", light_rule())?;
        for applied in &encoding.applied {
            write!(
                out,
                "  {:<8} {:<20} {:<10} {:<10}",
                applied.field.bit_range.to_string(),
                applied.field.name,
                format!("= {}", applied.value),
                format!("({})", hex(applied.value))
            )?;
            match applied.enum_used {
                Some(name) => writeln!(out, "  [{name}]")?,
                None => writeln!(out)?,
            }
        }
    }

    if !encoding.warnings.is_empty() {
        writeln!(out, "\n⚠ WARNINGS:")?;
        for warning in &encoding.warnings {
            writeln!(out, "  • {warning}")?;
        }
    }

    writeln!(out, "\n✅ Configuration is VALID")?;
    writeln!(out)
}

#[cfg(test)]
pub(crate) mod tests {
    use indoc::indoc;
    use svd_interpreter::{decode, encode, BaseValue};

    use super::*;

    pub(crate) const SVD: &str = indoc! {"
        <device>
          <name>DEMO</name>
          <vendor>Demo Corp</vendor>
          <cpu>
            <name>CM0</name>
            <nvicPrioBits>2</nvicPrioBits>
          </cpu>
          <peripherals>
            <peripheral>
              <name>GPIO</name>
              <baseAddress>0x50000000</baseAddress>
              <registers>
                <register>
                  <name>OUT</name>
                  <addressOffset>0x4</addressOffset>
                </register>
              </registers>
            </peripheral>
            <peripheral>
              <name>TIMER0</name>
              <description>A timer with a description long enough to be shortened</description>
              <groupName>TIMER</groupName>
              <baseAddress>0x40000000</baseAddress>
              <registers>
                <register>
                  <name>CTRL</name>
                  <description>Control</description>
                  <addressOffset>0x0</addressOffset>
                  <access>read-write</access>
                  <resetValue>0x1</resetValue>
                  <fields>
                    <field>
                      <name>ENABLE</name>
                      <bitRange>[0:0]</bitRange>
                    </field>
                    <field>
                      <name>MODE</name>
                      <description>Counting mode</description>
                      <bitRange>[2:1]</bitRange>
                      <enumeratedValues>
                        <enumeratedValue>
                          <name>ONESHOT</name>
                          <description>Stop at zero</description>
                          <value>0</value>
                        </enumeratedValue>
                        <enumeratedValue>
                          <name>PERIODIC</name>
                          <value>1</value>
                        </enumeratedValue>
                      </enumeratedValues>
                    </field>
                  </fields>
                </register>
              </registers>
            </peripheral>
          </peripherals>
        </device>
    "};

    fn render(f: impl FnOnce(&mut Vec<u8>) -> io::Result<()>) -> String {
        let mut out = Vec::new();
        f(&mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn helpers() {
        assert_eq!(title_case("nvic_prio_bits"), "Nvic Prio Bits");
        assert_eq!(truncate("abcdef", 3), "abc...");
        assert_eq!(truncate("abc", 3), "abc");
    }

    #[test]
    fn device_info_lists_cpu_properties_that_are_set() {
        let device = Device::parse(SVD).unwrap();
        let text = render(|out| device_info(out, &device));
        assert!(text.contains("Name:              DEMO\n"));
        assert!(text.contains("Default Width:     32 bits\n"));
        assert!(text.contains("  Nvic Prio Bits      : 2\n"));
        assert!(!text.contains("Revision"));
    }

    #[test]
    fn peripherals_are_grouped() {
        let device = Device::parse(SVD).unwrap();
        let text = render(|out| peripherals(out, &device));
        let gpio = text.find("  GPIO ").unwrap();
        let header = text.find("\nTIMER:\n").unwrap();
        assert!(gpio < header);
        assert!(text.contains(
            "  TIMER0               0x40000000   A timer with a description long enough to be ...\n"
        ));
    }

    #[test]
    fn register_lists_fields_most_significant_first() {
        let device = Device::parse(SVD).unwrap();
        let r = device.find_register("TIMER0", "CTRL").unwrap();
        let text = render(|out| register(out, &r));
        let mode = text.find("  [2:1]    MODE").unwrap();
        let enable = text.find("  [0]      ENABLE").unwrap();
        assert!(mode < enable);
        assert!(text.contains("Reset Value:      0x1\n"));
        assert!(text.contains("           0: ONESHOT: Stop at zero\n"));
    }

    #[test]
    fn range_groups_runs_of_peripherals() {
        let device = Device::parse(SVD).unwrap();
        let found = device.registers_in_range(0, u64::MAX).unwrap();
        let text = render(|out| registers_in_range(out, 0, u64::MAX, &found));
        assert!(text.contains("Found 2 register(s)\n"));
        assert!(text.contains("TIMER0 (Base: 0x40000000)\n"));
        assert!(text.contains("\n\nGPIO (Base: 0x50000000)\n"));
        assert!(text.contains("  0x40000000   CTRL                 (read-write)    Control\n"));

        let text = render(|out| registers_in_range(out, 1, 2, &[]));
        assert_eq!(text, "\nNo registers found in range 0x1 - 0x2\n");
    }

    #[test]
    fn decoded_shows_enumerated_names() {
        let device = Device::parse(SVD).unwrap();
        let r = device.find_register("TIMER0", "CTRL").unwrap();
        let fields = decode(r.register, 0x3);
        let text = render(|out| decoded(out, &r, 0x3, &fields));
        assert!(text.contains("          0b0000_0000_0000_0000_0000_0000_0000_0011 (binary)\n"));
        assert!(text.contains("\n  [2:1]    MODE                 = 1        (0x1)     \n"));
        assert!(text.contains("         → PERIODIC\n"));
    }

    #[test]
    fn encoded_reports_errors_only_when_invalid() {
        let device = Device::parse(SVD).unwrap();
        let r = device.find_register("TIMER0", "CTRL").unwrap();

        let assignments = [("MODE".to_owned(), "oneshot".to_owned())];
        let enc = encode(r.register, BaseValue::Reset, &assignments);
        let text = render(|out| encoded(out, &r, &enc));
        assert!(
            text.contains("  [2:1]    MODE                 = 0        (0x0)       [ONESHOT]\n")
        );
        assert!(text.contains("  • ENABLE not specified, using value from base: 1 (0x1)\n"));
        assert!(text.ends_with("\n✅ Configuration is VALID\n\n"));

        let assignments = [("SPEED".to_owned(), "1".to_owned())];
        let enc = encode(r.register, BaseValue::Reset, &assignments);
        let text = render(|out| encoded(out, &r, &enc));
        assert!(text.contains("  • Field 'SPEED' not found in register\n"));
        assert!(!text.contains("Result Value"));
    }
}
