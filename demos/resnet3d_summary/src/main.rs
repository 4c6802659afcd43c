#![recursion_limit = "256"]
//! Build a named `ResNet3d`, run a random clip through it,
//! and print the feature shapes and conv weight statistics.

use burn::backend::NdArray;
use burn::module::Module;
use burn::prelude::Tensor;
use burn::tensor::Distribution;
use bvmm::models::resnet3d::backbone::ResNet3dBackbone;
use bvmm::models::resnet3d::pretrained::PREFAB_RESNET3D_MAP;
use bvmm::models::resnet3d::prefabs::resnet3d_from_prefab;
use bvmm::models::resnet3d::resnet_model::{ResNet3d, ResNet3dConfig, ResNet3dMeta};
use bvmm::utility::burn::record::record_summary_pretty;
use bvmm::utility::burn::stats::TensorStats;
use clap::Parser;
use tracing_subscriber::EnvFilter;

// $ cargo run --release -p resnet3d_summary -- --prefab=resnet18_3d --frames=4 --size=64
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Model prefab name.
    #[arg(long, default_value = "resnet18_3d")]
    prefab: String,

    /// Load the published weights.
    #[arg(long, default_value_t = false)]
    pretrained: bool,

    /// Input channels.
    #[arg(long, default_value_t = 3)]
    in_channels: usize,

    /// Output classes.
    #[arg(long, default_value_t = 101)]
    num_classes: usize,

    /// Zero the last norm weight of every residual block.
    #[arg(long, default_value_t = false)]
    zero_init_residual: bool,

    /// Batch size.
    #[arg(long, default_value_t = 2)]
    batch_size: usize,

    /// Clip length; the depth axis.
    #[arg(long, default_value_t = 4)]
    frames: usize,

    /// Frame height and width.
    #[arg(long, default_value_t = 64)]
    size: usize,

    /// Print the conv weight stats as JSON lines.
    #[arg(long, default_value_t = false)]
    json: bool,

    /// Print the model record structure.
    #[arg(long, default_value_t = false)]
    print_record: bool,

    /// List the prefabs and exit.
    #[arg(long, default_value_t = false)]
    list: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    type B = NdArray<f32>;
    let device = Default::default();

    if args.list {
        for item in PREFAB_RESNET3D_MAP.items {
            let prefab = item.to_prefab();
            println!(
                "{:<14} {} (weights: {})",
                prefab.name,
                prefab.description,
                prefab.has_weights()
            );
        }
        return Ok(());
    }

    let model: ResNet3d<B> = resnet3d_from_prefab(
        &args.prefab,
        args.pretrained,
        |config| {
            ResNet3dConfig {
                in_channels: args.in_channels,
                num_classes: args.num_classes,
                ..config
            }
            .with_zero_init_residual(args.zero_init_residual)
        },
        &device,
    )?;

    tracing::info!(
        prefab = %args.prefab,
        params = model.num_params(),
        "built model"
    );

    let shape = [
        args.batch_size,
        model.in_channels(),
        args.frames,
        args.size,
        args.size,
    ];
    println!("input: {shape:?}");

    for (name, weight) in model.named_conv_weights() {
        let stats = TensorStats::of(weight);
        if args.json {
            println!("{}", serde_json::json!({"name": name, "stats": stats}));
        } else {
            println!("{name:<48} {stats}");
        }
    }

    let input: Tensor<B, 5> = Tensor::random(shape, Distribution::Default, &device);
    let logits = model.forward(input.clone());
    println!("logits: {:?}", logits.dims());

    if args.print_record {
        println!("{}", record_summary_pretty::<B, _>(model.clone().into_record())?);
    }

    let backbone: ResNet3dBackbone<B> = model.into();
    for (idx, feature) in backbone.forward(input).iter().enumerate() {
        println!("x{}: {:?}", idx + 1, feature.dims());
    }

    Ok(())
}
