//! ResNet-18 backbone with a linear head, laid out with torchvision
//! parameter names so fine-tuned checkpoints load without renaming.

use candle_core::{Module, Result, Tensor, D};
use candle_nn::{
    batch_norm, conv2d_no_bias, linear, BatchNorm, Conv2d, Conv2dConfig, Linear, VarBuilder,
};

const BN_EPS: f64 = 1e-5;
const STAGE_WIDTHS: [usize; 4] = [64, 128, 256, 512];
const BLOCKS_PER_STAGE: usize = 2;

/// Output width of the backbone, input width of `fc`.
pub const FEATURE_DIM: usize = 512;

fn conv(
    c_in: usize,
    c_out: usize,
    kernel: usize,
    stride: usize,
    padding: usize,
    vb: VarBuilder,
) -> Result<Conv2d> {
    let cfg = Conv2dConfig {
        stride,
        padding,
        ..Default::default()
    };
    conv2d_no_bias(c_in, c_out, kernel, cfg, vb)
}

struct BasicBlock {
    conv1: Conv2d,
    bn1: BatchNorm,
    conv2: Conv2d,
    bn2: BatchNorm,
    downsample: Option<(Conv2d, BatchNorm)>,
}

impl BasicBlock {
    fn new(c_in: usize, c_out: usize, stride: usize, vb: VarBuilder) -> Result<Self> {
        let downsample = if stride != 1 || c_in != c_out {
            let ds = vb.pp("downsample");
            Some((
                conv(c_in, c_out, 1, stride, 0, ds.pp("0"))?,
                batch_norm(c_out, BN_EPS, ds.pp("1"))?,
            ))
        } else {
            None
        };

        Ok(Self {
            conv1: conv(c_in, c_out, 3, stride, 1, vb.pp("conv1"))?,
            bn1: batch_norm(c_out, BN_EPS, vb.pp("bn1"))?,
            conv2: conv(c_out, c_out, 3, 1, 1, vb.pp("conv2"))?,
            bn2: batch_norm(c_out, BN_EPS, vb.pp("bn2"))?,
            downsample,
        })
    }

    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let ys = xs
            .apply(&self.conv1)?
            .apply_t(&self.bn1, false)?
            .relu()?
            .apply(&self.conv2)?
            .apply_t(&self.bn2, false)?;

        let shortcut = match &self.downsample {
            Some((conv, bn)) => xs.apply(conv)?.apply_t(bn, false)?,
            None => xs.clone(),
        };

        (ys + shortcut)?.relu()
    }
}

/// Eye-disease classifier network. Batch norm always runs with its running
/// statistics; there is no training mode.
pub struct EyeNet {
    conv1: Conv2d,
    bn1: BatchNorm,
    stages: Vec<Vec<BasicBlock>>,
    fc: Linear,
}

impl EyeNet {
    pub fn new(vb: VarBuilder, num_classes: usize) -> Result<Self> {
        let conv1 = conv(3, 64, 7, 2, 3, vb.pp("conv1"))?;
        let bn1 = batch_norm(64, BN_EPS, vb.pp("bn1"))?;

        let mut stages = Vec::with_capacity(STAGE_WIDTHS.len());
        let mut c_in = 64;
        for (i, &width) in STAGE_WIDTHS.iter().enumerate() {
            let stage_vb = vb.pp(format!("layer{}", i + 1));
            let mut blocks = Vec::with_capacity(BLOCKS_PER_STAGE);
            for b in 0..BLOCKS_PER_STAGE {
                let stride = if i > 0 && b == 0 { 2 } else { 1 };
                blocks.push(BasicBlock::new(c_in, width, stride, stage_vb.pp(b.to_string()))?);
                c_in = width;
            }
            stages.push(blocks);
        }

        let fc = linear(FEATURE_DIM, num_classes, vb.pp("fc"))?;

        Ok(Self {
            conv1,
            bn1,
            stages,
            fc,
        })
    }
}

impl Module for EyeNet {
    /// `(batch, 3, h, w)` → `(batch, num_classes)` logits.
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let mut xs = xs
            .apply(&self.conv1)?
            .apply_t(&self.bn1, false)?
            .relu()?
            // 3x3/2 max pool with one pixel of padding; edge replication
            // matches -inf padding for a max.
            .pad_with_same(D::Minus1, 1, 1)?
            .pad_with_same(D::Minus2, 1, 1)?
            .max_pool2d_with_stride(3, 2)?;

        for block in self.stages.iter().flatten() {
            xs = block.forward(&xs)?;
        }

        xs.mean(D::Minus1)?.mean(D::Minus1)?.apply(&self.fc)
    }
}
