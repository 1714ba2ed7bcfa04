//! Processing modules bundled with the Auricle host.
//!
//! | name        | does                                                    |
//! |-------------|---------------------------------------------------------|
//! | `identity`  | passes waveforms and spectra through unchanged          |
//! | `gain`      | per-channel gain in dB, in either domain                |
//! | `acframeno` | publishes a block counter to the AC space               |
//! | `chain`     | runs a list of modules as a single one                  |

mod acframeno;
mod chain;
mod command;
mod gain;
mod identity;

use auricle_sdk::{FnModuleFactory, Module, ModuleDescriptor, Registry};

pub use acframeno::FrameCounter;
pub use chain::Chain;
pub use gain::Gain;
pub use identity::Identity;

/// Adds the modules of this crate to `registry`.
pub fn register(registry: &mut Registry) {
    registry
        .register_module(Box::new(FnModuleFactory::new(
            ModuleDescriptor::new(identity::NAME)
                .with_documentation("Identity transform, returns the input signal unchanged.")
                .with_category("example"),
            |_| Ok(Box::new(Identity) as Box<dyn Module>),
        )))
        .register_module(Box::new(FnModuleFactory::new(
            ModuleDescriptor::new(gain::NAME)
                .with_documentation(
                    "Apply a gain to each channel. Works on waveforms and on spectra.",
                )
                .with_category("level modification"),
            |_| Ok(Box::new(Gain::default()) as Box<dyn Module>),
        )))
        .register_module(Box::new(FnModuleFactory::new(
            ModuleDescriptor::new(acframeno::NAME)
                .with_documentation(
                    "Count the processed blocks and publish the count as an int AC \
                     variable named after the instance.",
                )
                .with_category("data flow"),
            |context| {
                Ok(Box::new(FrameCounter::new(
                    context.ac.clone(),
                    context.instance.as_str(),
                )) as Box<dyn Module>)
            },
        )))
        .register_module(Box::new(FnModuleFactory::new(
            ModuleDescriptor::new(chain::NAME)
                .with_documentation(
                    "Processing chain. Loads the modules listed in `algos` and runs \
                     them in order, sharing one AC space.",
                )
                .with_category("data flow"),
            |context| Ok(Box::new(Chain::new(context)) as Box<dyn Module>),
        )));
}
