use crate::model::Register;

/// Device-level metadata and the peripherals of a CMSIS-SVD file
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Device {
    pub name: String,
    pub vendor: String,
    pub version: String,
    pub description: String,
    pub cpu: Option<Cpu>,
    /// Number of data bits uniquely selected by each address
    pub address_unit_bits: u64,
    /// Bit-width of the maximum single data transfer supported by the bus infrastructure
    pub width: u64,
    pub peripherals: Vec<Peripheral>,
}

/// Processor core description
///
/// Values are kept as they appear in the input. Missing elements are empty strings.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Cpu {
    pub name: String,
    pub revision: String,
    pub endian: String,
    pub mpu_present: String,
    pub fpu_present: String,
    pub nvic_prio_bits: String,
    pub vendor_systick: String,
}

impl Cpu {
    /// Named properties in presentation order, e.g., for `--json` output
    pub fn properties(&self) -> [(&'static str, &str); 7] {
        [
            ("name", self.name.as_str()),
            ("revision", self.revision.as_str()),
            ("endian", self.endian.as_str()),
            ("mpu_present", self.mpu_present.as_str()),
            ("fpu_present", self.fpu_present.as_str()),
            ("nvic_prio_bits", self.nvic_prio_bits.as_str()),
            ("vendor_systick", self.vendor_systick.as_str()),
        ]
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Peripheral {
    pub name: String,
    pub description: String,
    pub base_address: u64,
    pub group_name: Option<String>,
    /// Name of the peripheral this one was derived from using `derivedFrom`
    pub derived_from: Option<String>,
    pub registers: Vec<Register>,
}

impl Peripheral {
    /// Find a register of this peripheral by its exact name
    pub fn register(&self, name: &str) -> Option<&Register> {
        self.registers.iter().find(|reg| reg.name == name)
    }
}
