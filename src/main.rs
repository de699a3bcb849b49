use std::{env, fs};

use ann_runtime::{
    arch::Sequential,
    specs::TrainerSpec,
    token::{bunch_from_rows, rows_of},
};
use anyhow::Context;
use log::info;
use rand::{SeedableRng, rngs::StdRng};

const DEFAULT_SPEC: &str = r#"{
    "model": {
        "input_size": 2,
        "components": [
            { "dense": { "name": "hidden", "weights": "w1", "output": 2 } },
            { "bias": { "name": "hidden_bias", "weights": "b1" } },
            { "activation": { "name": "hidden_act", "act_fn": "logistic" } },
            { "dense": { "name": "out", "weights": "w2", "output": 1 } },
            { "bias": { "name": "out_bias", "weights": "b2" } },
            { "activation": { "name": "out_act", "act_fn": "logistic" } }
        ]
    },
    "loss": "mse",
    "learning_rate": 2.0,
    "momentum": 0.5,
    "epochs": 5000,
    "init": { "low": -1.0, "high": 1.0, "seed": 7 }
}"#;

const XS: [[f32; 2]; 4] = [[0., 0.], [0., 1.], [1., 0.], [1., 1.]];
const YS: [[f32; 1]; 4] = [[0.], [1.], [1.], [0.]];

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let spec = match env::args().nth(1) {
        Some(path) => {
            fs::read_to_string(&path).with_context(|| format!("failed to read spec at {path}"))?
        }
        None => DEFAULT_SPEC.to_string(),
    };
    let spec: TrainerSpec = serde_json::from_str(&spec).context("invalid trainer spec")?;

    let mut model = Sequential::from_spec(spec.model.clone())?;
    spec.configure(&mut model)?;

    let mut rng = match spec.init.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };
    model.randomize_weights(&mut rng, spec.init.low, spec.init.high)?;

    let mut loss = spec.loss.build(model.output_size())?;
    let target = bunch_from_rows(&YS)?.into_ref();
    let epochs = spec.epochs.get();

    for epoch in 1..=epochs {
        loss.reset();
        let input = bunch_from_rows(&XS)?.into_ref();
        model.train_step(input, &target, loss.as_mut())?;

        if epoch % 500 == 0 || epoch == epochs {
            info!(epoch = epoch; "loss {}", loss.accum_loss());
        }
    }

    model.check_weights()?;
    model.reset()?;

    let output = model.forward(bunch_from_rows(&XS)?.into_ref(), false)?;
    let mut output = output.borrow_mut();
    let predictions = rows_of(output.as_block_mut("output")?, model.output_size())?;

    for (x, y) in XS.iter().zip(predictions) {
        println!("{x:?} -> {y:?}");
    }

    Ok(())
}
