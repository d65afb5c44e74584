#![no_main]
use libfuzzer_sys::fuzz_target;
use soc_traits::{Chemistry, ChemistryKind};

fuzz_target!(|input: (u8, f64, f64, f64)| {
    let (code, soc, temp_c, dv) = input;
    let Ok(kind) = ChemistryKind::try_from(code % 3) else {
        return;
    };
    let chem = soc_config::builtin(kind);
    // Lookups clamp at the table edges; finite inputs give finite outputs.
    let v = chem.voc_soc(soc, temp_c);
    let r = chem.hys_resistance(dv, soc);
    let (lo, hi) = chem.hys_bounds(soc);
    if soc.is_finite() && temp_c.is_finite() && dv.is_finite() {
        assert!(v.is_finite() && r.is_finite());
        assert!(lo <= hi);
    }
    let _ = chem.min_soc(temp_c);
});
