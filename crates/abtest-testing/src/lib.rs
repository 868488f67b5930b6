//! Testing utilities and harness for abtest-core

pub mod testing;

pub use testing::*;

pub mod prelude {
    pub use crate::testing::*;
    pub use abtest_core::{
        children, create_element, fragment, Child, Component, Host, MemoryDocument, Mutation,
        Props, VNode,
    };
}
