//! Device description shared by unit tests

use indoc::indoc;

use crate::model::Device;

/// Register map:
///
/// * TIMER0 @ 0x4000_0000: CTRL +0x0 (ENABLE [0], MODE [2:1] enumerated, PRESCALE [7:4]),
///   STATUS +0x4, COUNT +0x8
/// * TIMER1 @ 0x4000_1000, derived from TIMER0
/// * UART0 @ 0x4000_2000: DATA +0x0, CH0.CFG +0x24, CH1.CFG +0x34, TX_FIFO +0x8, RX_FIFO +0xc
/// * GPIO @ 0x5000_0000: OUT +0x0
pub(crate) const SVD: &str = indoc! {r#"
    <?xml version="1.0" encoding="utf-8"?>
    <device schemaVersion="1.3" xmlns:xs="http://www.w3.org/2001/XMLSchema-instance" xs:noNamespaceSchemaLocation="CMSIS-SVD.xsd">
      <vendor>Acme</vendor>
      <name>ACME1</name>
      <version>1.2</version>
      <description>Acme test device</description>
      <cpu>
        <name>CM4</name>
        <revision>r0p1</revision>
        <endian>little</endian>
        <mpuPresent>true</mpuPresent>
        <fpuPresent>true</fpuPresent>
        <nvicPrioBits>3</nvicPrioBits>
        <vendorSystickConfig>false</vendorSystickConfig>
      </cpu>
      <addressUnitBits>8</addressUnitBits>
      <width>32</width>
      <size>32</size>
      <access>read-write</access>
      <peripherals>
        <peripheral>
          <name>TIMER0</name>
          <description>Timer 0</description>
          <groupName>TIMER</groupName>
          <baseAddress>0x40000000</baseAddress>
          <registers>
            <register>
              <name>CTRL</name>
              <description>Control register</description>
              <addressOffset>0x0</addressOffset>
              <resetValue>0x00000010</resetValue>
              <fields>
                <field>
                  <name>ENABLE</name>
                  <description>Enable the timer</description>
                  <bitOffset>0</bitOffset>
                  <bitWidth>1</bitWidth>
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
                    <enumeratedValue>
                      <name>CONTINUOUS</name>
                      <value>0x2</value>
                    </enumeratedValue>
                  </enumeratedValues>
                </field>
                <field>
                  <name>PRESCALE</name>
                  <lsb>4</lsb>
                  <msb>7</msb>
                  <access>read-write</access>
                </field>
              </fields>
            </register>
            <register>
              <name>STATUS</name>
              <description>Status register</description>
              <addressOffset>0x4</addressOffset>
              <access>read-only</access>
              <fields>
                <field>
                  <name>IRQ</name>
                  <bitRange>[0:0]</bitRange>
                </field>
              </fields>
            </register>
            <register>
              <name>COUNT</name>
              <description>Current counter value</description>
              <addressOffset>0x8</addressOffset>
            </register>
          </registers>
        </peripheral>
        <peripheral derivedFrom="TIMER0">
          <name>TIMER1</name>
          <baseAddress>0x40001000</baseAddress>
        </peripheral>
        <peripheral>
          <name>UART0</name>
          <description>Serial port</description>
          <groupName>UART</groupName>
          <baseAddress>0x40002000</baseAddress>
          <size>16</size>
          <registers>
            <register>
              <name>DATA</name>
              <addressOffset>0x0</addressOffset>
              <size>8</size>
            </register>
            <cluster>
              <dim>2</dim>
              <dimIncrement>0x10</dimIncrement>
              <name>CH[%s]</name>
              <addressOffset>0x20</addressOffset>
              <register>
                <name>CFG</name>
                <addressOffset>0x4</addressOffset>
              </register>
            </cluster>
            <register>
              <dim>2</dim>
              <dimIncrement>4</dimIncrement>
              <dimIndex>TX,RX</dimIndex>
              <name>%s_FIFO</name>
              <addressOffset>0x8</addressOffset>
            </register>
          </registers>
        </peripheral>
        <peripheral>
          <name>GPIO</name>
          <description>General purpose I/O</description>
          <baseAddress>0x50000000</baseAddress>
          <resetValue>0xFFFF</resetValue>
          <registers>
            <register>
              <name>OUT</name>
              <addressOffset>0</addressOffset>
            </register>
          </registers>
        </peripheral>
      </peripherals>
    </device>
"#};

pub(crate) fn device() -> Device {
    Device::parse(SVD).expect("test device must parse")
}
