// External imports
use burn::module::Module;
use burn::nn::{Dropout, DropoutConfig, Linear, LinearConfig};
use burn::tensor::{backend::Backend, Tensor};

// Internal imports
use super::step_2_lstm_cell::LstmCell;

/// LSTM layer followed by dropout and a single-output linear head
///
/// Only the hidden state of the last timestep reaches the head. Dropout is active
/// on autodiff backends only, so inference goes through `AutodiffModule::valid`.
#[derive(Module, Debug)]
pub struct WindPowerLstm<B: Backend> {
    input_size: usize,
    lstm: LstmCell<B>,
    dropout: Dropout,
    output: Linear<B>,
}

impl<B: Backend> WindPowerLstm<B> {
    pub fn new(input_size: usize, hidden_size: usize, dropout_prob: f64, device: &B::Device) -> Self {
        Self {
            input_size,
            lstm: LstmCell::new(input_size, hidden_size, device),
            dropout: DropoutConfig::new(dropout_prob).init(),
            output: LinearConfig::new(hidden_size, 1).init(device),
        }
    }

    pub fn input_size(&self) -> usize {
        self.input_size
    }

    pub fn hidden_size(&self) -> usize {
        self.lstm.hidden_size()
    }

    /// `[batch, timesteps, features]` -> `[batch, 1]`
    pub fn forward(&self, x: Tensor<B, 3>) -> Tensor<B, 2> {
        let sequence = self.lstm.forward(x);
        let [batch_size, seq_len, hidden_size] = sequence.dims();

        let last = sequence
            .narrow(1, seq_len - 1, 1)
            .reshape([batch_size, hidden_size]);

        self.output.forward(self.dropout.forward(last))
    }
}
