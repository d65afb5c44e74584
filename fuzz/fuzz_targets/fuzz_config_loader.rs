#![no_main]
use libfuzzer_sys::fuzz_target;
use soc_traits::{Chemistry, ChemistryKind, ChemistryProvider};

fuzz_target!(|data: &str| {
    // Parsing and validation may reject anything but must never panic.
    let Ok(cfg) = soc_config::load_toml(data) else {
        return;
    };
    if cfg.validate().is_err() {
        return;
    }
    // A validated config always yields a usable bank.
    let Ok(bank) = soc_config::ChemistryBank::from_config(&cfg.chemistry) else {
        return;
    };
    for kind in ChemistryKind::ALL {
        if let Some(chem) = bank.chemistry(kind) {
            let _ = chem.voc_soc(0.5, 25.0);
        }
    }
});
