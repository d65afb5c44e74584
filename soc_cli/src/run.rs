//! Closed-loop run: the simulator stands in for the battery and the monitor
//! estimates from its voltage and current.

use crate::cli::RunArgs;
use serde_json::json;
use soc_config::{ChemistryBank, Config, load_voc_soc_csv, parse_kind};
use soc_core::{
    BatteryConsts, BatteryModel, BuildError, CoulombInput, Estimator, Monitor, MonitorInput,
    MonitorWarmStart, RetainedCfg, SimInput, SimWarmStart, Simulator,
};
use soc_traits::{Chemistry, ChemistryKind, ChemistryProvider};

/// Chemistry bank from the config, with an optional OCV CSV replacing the
/// selected chemistry's surface.
pub fn build_bank(
    cfg: &Config,
    kind: ChemistryKind,
    voc_csv: Option<&std::path::Path>,
) -> eyre::Result<ChemistryBank> {
    let mut bank = ChemistryBank::from_config(&cfg.chemistry)?;
    if let Some(path) = voc_csv {
        let table = load_voc_soc_csv(path)?;
        let chem = bank
            .get(kind)
            .cloned()
            .ok_or(BuildError::MissingChemistry(kind))?;
        tracing::info!(chemistry = kind.name(), path = %path.display(), "OCV surface loaded");
        bank.insert(chem.with_voc_soc(table));
    }
    Ok(bank)
}

fn select<'a>(bank: &'a ChemistryBank, kind: ChemistryKind) -> eyre::Result<&'a dyn Chemistry> {
    Ok(bank
        .chemistry(kind)
        .ok_or(BuildError::MissingChemistry(kind))?)
}

pub fn check_config(cfg: &Config, json_mode: bool) -> eyre::Result<()> {
    let kind = parse_kind(&cfg.battery.chemistry)?;
    let bank = build_bank(cfg, kind, None)?;
    let chem = select(&bank, kind)?;
    let consts = BatteryConsts::from(cfg);
    Monitor::new(chem, consts.clone())?;
    Simulator::new(chem, consts)?;
    if json_mode {
        println!("{}", json!({ "event": "config_ok", "chemistry": kind.name() }));
    } else {
        println!("config OK: chemistry {}", kind.name());
    }
    Ok(())
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn run_closed_loop(cfg: &Config, args: &RunArgs, json_mode: bool) -> eyre::Result<()> {
    if !(0.0..=1.0).contains(&args.soc0) {
        eyre::bail!("soc0 must be within [0, 1], got {}", args.soc0);
    }
    let soc_mon = args.soc_mon.unwrap_or(args.soc0);
    if !(0.0..=1.0).contains(&soc_mon) {
        eyre::bail!("soc-mon must be within [0, 1], got {soc_mon}");
    }
    if !(args.seconds > 0.0) {
        eyre::bail!("seconds must be > 0");
    }
    let consts = BatteryConsts::from(cfg);
    let dt = args.dt.unwrap_or(consts.nom_dt);
    if !(dt > 0.0) {
        eyre::bail!("dt must be > 0");
    }

    let kind = parse_kind(args.chemistry.as_deref().unwrap_or(&cfg.battery.chemistry))?;
    let bank = build_bank(cfg, kind, args.voc_csv.as_deref())?;
    let chem = select(&bank, kind)?;
    let rp = RetainedCfg::from(&cfg.retained);
    let temp_c = args.temp;

    let mut sim = Simulator::new(chem, consts.clone())?;
    let mut mon = Monitor::new(chem, consts)?;
    sim.init_soc(chem, args.soc0, temp_c);
    mon.init_soc_ekf(chem, soc_mon, temp_c);
    tracing::info!(
        chemistry = kind.name(),
        dt,
        seconds = args.seconds,
        current = args.current,
        soc0 = args.soc0,
        soc_mon,
        "closed-loop run starting"
    );

    let ticks = (args.seconds / dt).round().max(1.0) as u64;
    let mut regauges = 0_u32;
    for k in 0..ticks {
        let reset = k == 0;
        let sin = SimInput {
            temp_c,
            soc: sim.soc(),
            ib_cmd: args.current,
            dt,
            reset,
            ..SimInput::default()
        };
        let vb = sim.calculate(chem, &sin, &SimWarmStart::default(), &rp);
        let min = MonitorInput {
            temp_c,
            vb,
            ib: sim.diag().ib,
            dt,
            reset,
            update_time: k % args.every == 0,
        };
        mon.calculate(chem, &min, &MonitorWarmStart::default(), &rp);

        let count = |charge_curr, sat| CoulombInput {
            dt,
            reset,
            temp_c,
            charge_curr,
            sat,
            ..CoulombInput::default()
        };
        let sim_count = count(sim.diag().ib_charge, sim.model_saturated());
        sim.count_coulombs(chem, &sim_count, &rp);
        let mon_count = count(mon.diag().ib_charge, mon.diag().sat);
        mon.count_coulombs(chem, &mon_count, &rp);
        if mon.regauge(chem, temp_c) {
            regauges += 1;
        }

        if k % args.every == 0 || k + 1 == ticks {
            let t = (k + 1) as f64 * dt;
            report_tick(t, &sim, &mon, json_mode);
        }
    }

    let t = ticks as f64 * dt;
    if json_mode {
        println!(
            "{}",
            json!({
                "event": "done",
                "t": t,
                "soc_sim": sim.soc(),
                "soc": mon.soc(),
                "soc_ekf": mon.soc_ekf(),
                "converged": mon.converged(),
                "regauges": regauges,
                "amp_hrs_remaining_ekf": mon.amp_hrs_remaining_ekf(),
                "amp_hrs_remaining_soc": mon.amp_hrs_remaining_soc(),
            })
        );
    } else {
        println!(
            "done: t={t:.1}s soc_sim={:.4} soc={:.4} soc_ekf={:.4} converged={} regauges={regauges}",
            sim.soc(),
            mon.soc(),
            mon.soc_ekf(),
            mon.converged(),
        );
    }
    Ok(())
}

/// Estimate minus truth, for soc and terminal voltage.
fn estimate_error(truth: &impl Estimator, est: &impl Estimator) -> (f64, f64) {
    (
        est.soc_estimate() - truth.soc_estimate(),
        est.voltage_estimate() - truth.voltage_estimate(),
    )
}

fn report_tick(t: f64, sim: &Simulator, mon: &Monitor, json_mode: bool) {
    let d = mon.diag();
    let (soc_err, vb_err) = estimate_error(sim, mon);
    if json_mode {
        println!(
            "{}",
            json!({
                "event": "tick",
                "t": t,
                "soc_sim": sim.soc(),
                "soc": mon.soc(),
                "soc_ekf": d.soc_ekf,
                "soc_err": soc_err,
                "vb": d.vb,
                "vb_err": vb_err,
                "ib": d.ib,
                "voc_stat": d.voc_stat,
                "dv_hys": d.dv_hys,
                "sat": d.sat,
                "bms_off": d.bms_off,
                "converged": d.converged,
                "cutback": format!("{:?}", sim.cutback()),
                "tcharge": d.tcharge,
            })
        );
    } else {
        println!(
            "t={t:>8.1}s vb={:>7.3} ib={:>8.2} soc_sim={:.4} soc={:.4} soc_ekf={:.4} soc_err={soc_err:+.4} tcharge={:>6.2}h",
            d.vb,
            d.ib,
            sim.soc(),
            mon.soc(),
            d.soc_ekf,
            d.tcharge,
        );
    }
}
