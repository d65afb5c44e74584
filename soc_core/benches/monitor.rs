use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use soc_config::builtin;
use soc_core::{
    BatteryConsts, BatteryModel, CoulombInput, Monitor, MonitorInput, MonitorWarmStart,
    RetainedCfg, SimInput, SimWarmStart, Simulator,
};
use soc_traits::ChemistryKind;

// Closed loop: simulator produces vb, monitor estimates from it.
fn closed_loop(c: &mut Criterion) {
    let chem = builtin(ChemistryKind::BattleBorn);
    let rp = RetainedCfg::default();
    let dt = 0.1;

    c.bench_function("closed_loop_1000_ticks", |b| {
        b.iter_batched(
            || {
                let mut sim = Simulator::new(&chem, BatteryConsts::default()).unwrap();
                let mut mon = Monitor::new(&chem, BatteryConsts::default()).unwrap();
                sim.init_soc(&chem, 0.9, 25.0);
                mon.init_soc_ekf(&chem, 0.9, 25.0);
                (sim, mon)
            },
            |(mut sim, mut mon)| {
                for k in 0..1000 {
                    let reset = k == 0;
                    let ib_cmd = if (k / 200) % 2 == 0 { -20.0 } else { 15.0 };
                    let sin = SimInput {
                        temp_c: 25.0,
                        soc: sim.soc(),
                        ib_cmd,
                        dt,
                        reset,
                        ..SimInput::default()
                    };
                    let vb = sim.calculate(&chem, &sin, &SimWarmStart::default(), &rp);
                    let ib = sim.diag().ib;
                    let min = MonitorInput {
                        temp_c: 25.0,
                        vb,
                        ib,
                        dt,
                        reset,
                        update_time: k % 10 == 0,
                    };
                    mon.calculate(&chem, &min, &MonitorWarmStart::default(), &rp);
                    let count = |charge_curr, sat| CoulombInput {
                        dt,
                        reset,
                        temp_c: 25.0,
                        charge_curr,
                        sat,
                        ..CoulombInput::default()
                    };
                    let sim_count = count(sim.diag().ib_charge, sim.model_saturated());
                    sim.count_coulombs(&chem, &sim_count, &rp);
                    let mon_count = count(mon.diag().ib_charge, mon.diag().sat);
                    mon.count_coulombs(&chem, &mon_count, &rp);
                }
                black_box(mon.soc_ekf())
            },
            BatchSize::SmallInput,
        );
    });
}

criterion_group!(benches, closed_loop);
criterion_main!(benches);
