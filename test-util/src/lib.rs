pub use demos::exponential::{
    EXP_SUM_DATA, exp_sum_factory, exp_sum_fit, exp_sum_meta_config, exp_sum_model,
    exp_sum_prior, exp_sum_solver,
};
pub use demos::multi_key::{MULTI_KEY_DATA, multi_key_fit, multi_key_model, multi_key_prior};
pub use demos::polynomial::{
    POLY_DATA, poly_factory, poly_fit, poly_meta_config, poly_model, poly_prior,
};
pub use demos::DemoError;
pub use solvers::{CountingFitter, FailingFitter};

mod demos;
mod solvers;
