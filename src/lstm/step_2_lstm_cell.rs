// External imports
use burn::module::Module;
use burn::nn::{Linear, LinearConfig};
use burn::tensor::{activation, backend::Backend, Tensor};

/// Single-layer unidirectional LSTM
///
/// The four gates (input, forget, cell, output) share one input projection and
/// one recurrent projection of width `4 * hidden_size`.
#[derive(Module, Debug)]
pub struct LstmCell<B: Backend> {
    input_size: usize,
    hidden_size: usize,
    input_weights: Linear<B>,
    hidden_weights: Linear<B>,
}

impl<B: Backend> LstmCell<B> {
    pub fn new(input_size: usize, hidden_size: usize, device: &B::Device) -> Self {
        let gate_size = 4 * hidden_size;
        let input_weights = LinearConfig::new(input_size, gate_size).init(device);
        let hidden_weights = LinearConfig::new(hidden_size, gate_size)
            .with_bias(false)
            .init(device);

        Self {
            input_size,
            hidden_size,
            input_weights,
            hidden_weights,
        }
    }

    pub fn hidden_size(&self) -> usize {
        self.hidden_size
    }

    /// Runs the sequence from zero state.
    ///
    /// Input `[batch, seq_len, input_size]`, output `[batch, seq_len, hidden_size]`
    /// with the hidden state after every step.
    pub fn forward(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        let device = x.device();
        let [batch_size, seq_len, _] = x.dims();

        let mut h = Tensor::<B, 2>::zeros([batch_size, self.hidden_size], &device);
        let mut c = Tensor::<B, 2>::zeros([batch_size, self.hidden_size], &device);
        let mut outputs = Vec::with_capacity(seq_len);

        for t in 0..seq_len {
            let x_t = x
                .clone()
                .narrow(1, t, 1)
                .reshape([batch_size, self.input_size]);

            let gates = self.input_weights.forward(x_t) + self.hidden_weights.forward(h);
            let hs = self.hidden_size;
            let i_gate = gates.clone().narrow(1, 0, hs);
            let f_gate = gates.clone().narrow(1, hs, hs);
            let g_gate = gates.clone().narrow(1, 2 * hs, hs);
            let o_gate = gates.narrow(1, 3 * hs, hs);

            let i = activation::sigmoid(i_gate);
            let f = activation::sigmoid(f_gate);
            let g = activation::tanh(g_gate);
            let o = activation::sigmoid(o_gate);

            c = f * c + i * g;
            h = o * activation::tanh(c.clone());

            outputs.push(h.clone().unsqueeze_dim::<3>(1));
        }

        Tensor::cat(outputs, 1)
    }
}
