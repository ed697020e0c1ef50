//! JNI exports for `com.seekerclaw.app.service.NodeBridge`
//!
//! ```kotlin
//! private external fun startNodeWithArguments(arguments: Array<String>): Int
//! private external fun isNodeAlive(): Boolean
//! ```
//!
//! `startNodeWithArguments` blocks the calling thread until Node.js exits.
//! Every failure is logged at error priority and reported as exit code `-1`.

use crate::logging;
use crate::process;
use crate::runtime::default_runtime;
use jni::JNIEnv;
use jni::objects::{JObject, JObjectArray, JString};
use jni::sys::{JNI_FALSE, JNI_TRUE, jboolean, jint};
use node_bridge_core::{BridgeConfig, LogSink, Priority, platform_sink};
use std::io;
use std::sync::Arc;
use tracing::error;

/// Exit code reported when the runtime could not be started
const START_FAILED: jint = -1;

#[unsafe(no_mangle)]
pub extern "system" fn Java_com_seekerclaw_app_service_NodeBridge_startNodeWithArguments<'local>(
    mut env: JNIEnv<'local>,
    _this: JObject<'local>,
    arguments: JObjectArray<'local>,
) -> jint {
    let config = BridgeConfig::default();
    let Some(sink) = open_sink(platform_sink()) else {
        return START_FAILED;
    };
    // Ignore a subscriber installed by the host application
    let _ = logging::init(&config, sink.clone());

    let arguments = match read_arguments(&mut env, &arguments) {
        Ok(arguments) => arguments,
        Err(e) => {
            report(&sink, &config.tag, &format!("Failed to read arguments: {}", e));
            return START_FAILED;
        }
    };

    let tag = config.tag.clone();
    match process::run_once(config, sink.clone(), default_runtime(), &arguments) {
        Ok(code) => code,
        Err(e) => {
            report(&sink, &tag, &format!("Failed to start Node.js: {}", e));
            START_FAILED
        }
    }
}

#[unsafe(no_mangle)]
pub extern "system" fn Java_com_seekerclaw_app_service_NodeBridge_isNodeAlive<'local>(
    _env: JNIEnv<'local>,
    _this: JObject<'local>,
) -> jboolean {
    if process::is_alive() { JNI_TRUE } else { JNI_FALSE }
}

/// Copy a `String[]` into owned Rust strings, in order
fn read_arguments(env: &mut JNIEnv<'_>, arguments: &JObjectArray<'_>) -> jni::errors::Result<Vec<String>> {
    let count = env.get_array_length(arguments)?;
    let mut out = Vec::with_capacity(usize::try_from(count).unwrap_or(0));

    for index in 0..count {
        let element = JString::from(env.get_object_array_element(arguments, index)?);
        let value: String = env.get_string(&element)?.into();
        // Long argument lists must not exhaust the local reference table
        env.delete_local_ref(element)?;
        out.push(value);
    }

    Ok(out)
}

/// No sink means no logcat; the failure can only go to tracing
fn open_sink(opened: io::Result<Arc<dyn LogSink>>) -> Option<Arc<dyn LogSink>> {
    match opened {
        Ok(sink) => Some(sink),
        Err(e) => {
            error!("Failed to open the platform log: {}", e);
            None
        }
    }
}

fn report(sink: &Arc<dyn LogSink>, tag: &str, message: &str) {
    error!("{}", message);
    sink.write(Priority::Error, tag, message.as_bytes());
}
