//! Fixed instruction prompt and output schema for action segmentation.

use serde_json::{json, Value};

/// Instruction sent with every video.
pub const SEGMENTATION_PROMPT: &str = r#"You are an expert in analyzing robotic task videos. Your objective is to extract key, discrete actions performed by the robot(s) and their corresponding start and end timestamps from the provided video. The video may incorporate views from multiple cameras, including stationary and robot wrist-mounted cameras, showing robotic manipulation tasks.

Focus on tangible, goal-oriented actions performed by the robot(s), such as picking up objects, placing objects, manipulating tools, moving to specific locations, or interacting with its environment. Avoid describing continuous background activity or minute, inconsequential movements unless they are part of a larger, nameable action.

Provide the output as a single JSON object adhering strictly to the following schema:
{
"action_segments": [
    {
    "action": "Concise description of the robot's action (e.g., 'robot gripper picks up red block', 'robot arm moves to a blue container', 'robot tightens screw with tool')",
    "start_time": "HH:MM:SS.mmm (timestamp of action start, e.g., 00:01:12.345)",
    "end_time": "HH:MM:SS.mmm (timestamp of action end, e.g., 00:01:15.678)"
    }
]
}

Key Instructions:
- Analyze the entire video provided.
- Timestamps must be precise and strictly follow the "HH:MM:SS.mmm" format.
- Each segment should represent a distinct, continuous action performed by a robot.
- Descriptions should be in active voice from the robot's perspective where appropriate (e.g., "robot picks up" rather than "red block is picked up").
- If multiple distinct robotic actions occur sequentially or in parallel (if discernible as separate tasks), list each as a separate segment.

Example (Illustrative, adapt to robotic context):
Input: A video of a robot arm assembling parts.
Output:
{
"action_segments": [
    {
    "action": "robot arm approaches and grasps gear A",
    "start_time": "00:00:05.250",
    "end_time": "00:00:08.100"
    },
    {
    "action": "robot arm moves gear A towards assembly point",
    "start_time": "00:00:08.500",
    "end_time": "00:00:12.750"
    },
    {
    "action": "robot arm inserts gear A into slot B",
    "start_time": "00:00:13.000",
    "end_time": "00:00:15.200"
    }
]
}"#;

/// Output schema passed as the generation constraint.
pub fn response_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "action_segments": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "action": {"type": "string"},
                        "start_time": {"type": "string"},
                        "end_time": {"type": "string"}
                    },
                    "required": ["action", "start_time", "end_time"]
                }
            }
        },
        "required": ["action_segments"]
    })
}
