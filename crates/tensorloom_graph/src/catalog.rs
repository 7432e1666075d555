// SPDX-License-Identifier: MIT OR Apache-2.0
//! Built-in node specs for dataset pipelines.

use crate::node::{NodeCategory, NodeRegistry, NodeSpec, PortSpec};
use crate::port::DataType;

/// Create the standard pipeline node registry
pub fn standard_registry() -> NodeRegistry {
    let mut registry = NodeRegistry::new();

    // Value sources
    registry.register(NodeSpec {
        id: "integer_value".to_string(),
        name: "Integer Value".to_string(),
        category: NodeCategory::Source,
        description: "Constant integer value".to_string(),
        inputs: vec![],
        outputs: vec![PortSpec::output("value", DataType::Int)],
    });

    registry.register(NodeSpec {
        id: "float_value".to_string(),
        name: "Float Value".to_string(),
        category: NodeCategory::Source,
        description: "Constant float value".to_string(),
        inputs: vec![],
        outputs: vec![PortSpec::output("value", DataType::Float)],
    });

    registry.register(NodeSpec {
        id: "numeric_array".to_string(),
        name: "Numeric Array".to_string(),
        category: NodeCategory::Source,
        description: "In-memory numeric array".to_string(),
        inputs: vec![],
        outputs: vec![PortSpec::output("data", DataType::NumericArray)],
    });

    registry.register(NodeSpec {
        id: "image_dataset".to_string(),
        name: "Image Dataset".to_string(),
        category: NodeCategory::Source,
        description: "In-memory labeled image dataset".to_string(),
        inputs: vec![],
        outputs: vec![
            PortSpec::output("images", DataType::ImageArray),
            PortSpec::output("labels", DataType::Categorical),
        ],
    });

    // Math
    registry.register(NodeSpec {
        id: "add_two_values".to_string(),
        name: "Add Two Values".to_string(),
        category: NodeCategory::Math,
        description: "Sum of two integer inputs".to_string(),
        inputs: vec![
            PortSpec::input("value1", DataType::Int),
            PortSpec::input("value2", DataType::Int),
        ],
        outputs: vec![PortSpec::output("result", DataType::Int)],
    });

    // Dataset transformations
    registry.register(NodeSpec {
        id: "scale_array".to_string(),
        name: "Scale Array".to_string(),
        category: NodeCategory::Dataset,
        description: "Multiply every element by a factor".to_string(),
        inputs: vec![
            PortSpec::input("data", DataType::NumericArray),
            PortSpec::input("factor", DataType::Float),
        ],
        outputs: vec![PortSpec::output("data", DataType::NumericArray)],
    });

    registry.register(NodeSpec {
        id: "array_mean".to_string(),
        name: "Array Mean".to_string(),
        category: NodeCategory::Dataset,
        description: "Mean of every element in an array".to_string(),
        inputs: vec![PortSpec::input("data", DataType::NumericArray)],
        outputs: vec![PortSpec::output("mean", DataType::Numeric)],
    });

    registry.register(NodeSpec {
        id: "train_test_split".to_string(),
        name: "Train/Test Split".to_string(),
        category: NodeCategory::Dataset,
        description: "Split an array into train and test partitions".to_string(),
        inputs: vec![
            PortSpec::input("data", DataType::NumericArray),
            PortSpec::input("ratio", DataType::Float),
        ],
        outputs: vec![
            PortSpec::output("train", DataType::NumericArray),
            PortSpec::output("test", DataType::NumericArray),
        ],
    });

    // Sinks
    registry.register(NodeSpec {
        id: "value_preview".to_string(),
        name: "Value Preview".to_string(),
        category: NodeCategory::Sink,
        description: "Display the last received value".to_string(),
        inputs: vec![PortSpec::input("value", DataType::Int)],
        outputs: vec![],
    });

    registry.register(NodeSpec {
        id: "array_preview".to_string(),
        name: "Array Preview".to_string(),
        category: NodeCategory::Sink,
        description: "Display the last received array".to_string(),
        inputs: vec![PortSpec::input("data", DataType::NumericArray)],
        outputs: vec![],
    });

    registry
}
