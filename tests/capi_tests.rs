use std::ffi::{CStr, CString};
use std::fs;
use std::path::PathBuf;
use std::ptr;
use std::slice;

use prost::Message;
use tempfile::TempDir;

use netbridge::capi::{
    netbridge_channels, netbridge_delete, netbridge_disable_profiling, netbridge_end_profiling,
    netbridge_free_string, netbridge_get_predictions, netbridge_height, netbridge_init,
    netbridge_last_error, netbridge_new, netbridge_pred_len, netbridge_predict,
    netbridge_read_profile, netbridge_set_mode, netbridge_start_profiling, netbridge_width,
    PredictorHandle, MODE_CPU, MODE_GPU,
};
use netbridge::{
    ExecutionMode, InputDef, LayerDef, LayerKind, LayerParams, LayerWeightsProto, NetWeights,
    NetworkDef, TensorBlob,
};

const EMPTY_REPORT: &str = r#"{"name":"","metadata":"","start":0,"end":null,"layers":[]}"#;

fn picker_def() -> NetworkDef {
    NetworkDef {
        name: "picker".to_string(),
        input: InputDef {
            name: "data".to_string(),
            shape: [2, 1, 2, 2],
        },
        layers: vec![LayerDef {
            name: "ip1".to_string(),
            kind: LayerKind::InnerProduct,
            input: "data".to_string(),
            output: "scores".to_string(),
            params: LayerParams {
                num_output: Some(2),
                ..Default::default()
            },
        }],
    }
}

fn picker_weights() -> NetWeights {
    NetWeights {
        name: "picker".to_string(),
        layers: vec![LayerWeightsProto {
            name: "ip1".to_string(),
            tensors: vec![
                TensorBlob {
                    dims: vec![2, 4],
                    data: vec![1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0],
                },
                TensorBlob {
                    dims: vec![2],
                    data: vec![0.5, -0.5],
                },
            ],
        }],
    }
}

fn write_pair(dir: &TempDir) -> (PathBuf, PathBuf) {
    let model = dir.path().join("model.json");
    let trained = dir.path().join("trained.nbw");
    fs::write(&model, serde_json::to_vec(&picker_def()).unwrap()).unwrap();
    fs::write(&trained, picker_weights().encode_to_vec()).unwrap();
    (model, trained)
}

fn c_path(path: &PathBuf) -> CString {
    CString::new(path.to_str().unwrap()).unwrap()
}

fn open_picker(dir: &TempDir, batch: i32) -> PredictorHandle {
    let (model, trained) = write_pair(dir);
    let model = c_path(&model);
    let trained = c_path(&trained);
    let handle = unsafe { netbridge_new(model.as_ptr(), trained.as_ptr(), batch, MODE_CPU) };
    assert!(!handle.is_null());
    handle
}

fn read_report(handle: PredictorHandle) -> String {
    unsafe {
        let raw = netbridge_read_profile(handle);
        assert!(!raw.is_null());
        let report = CStr::from_ptr(raw).to_str().unwrap().to_string();
        netbridge_free_string(raw);
        report
    }
}

#[test]
fn test_lifecycle() {
    let dir = TempDir::new().unwrap();
    netbridge_init();
    let handle = open_picker(&dir, 2);

    unsafe {
        assert_eq!(netbridge_width(handle), 2);
        assert_eq!(netbridge_height(handle), 2);
        assert_eq!(netbridge_channels(handle), 1);
        assert_eq!(netbridge_pred_len(handle), 2);
        assert!(netbridge_get_predictions(handle).is_null());

        let input: [f32; 8] = [1.0, 2.0, 3.0, 4.0, 10.0, 20.0, 30.0, 40.0];
        assert_eq!(netbridge_predict(handle, input.as_ptr()), 0);
        assert!(netbridge_last_error().is_null());

        let predictions = netbridge_get_predictions(handle);
        assert!(!predictions.is_null());
        let values = slice::from_raw_parts(predictions, 4);
        assert_eq!(values, &[1.5, 3.5, 10.5, 39.5]);

        netbridge_delete(handle);
    }
}

#[test]
fn test_new_with_missing_files() {
    let model = CString::new("/nonexistent/model.json").unwrap();
    let trained = CString::new("/nonexistent/trained.nbw").unwrap();

    let handle = unsafe { netbridge_new(model.as_ptr(), trained.as_ptr(), 1, MODE_CPU) };
    assert!(handle.is_null());

    let message = unsafe {
        let raw = netbridge_last_error();
        assert!(!raw.is_null());
        CStr::from_ptr(raw).to_str().unwrap().to_string()
    };
    assert!(message.contains("not found"), "got: {}", message);
}

#[test]
fn test_new_rejects_bad_arguments() {
    let dir = TempDir::new().unwrap();
    let (model, trained) = write_pair(&dir);
    let model = c_path(&model);
    let trained = c_path(&trained);

    unsafe {
        let handle = netbridge_new(ptr::null(), trained.as_ptr(), 1, MODE_CPU);
        assert!(handle.is_null());
        assert!(!netbridge_last_error().is_null());

        let handle = netbridge_new(model.as_ptr(), trained.as_ptr(), 0, MODE_CPU);
        assert!(handle.is_null());
        assert!(!netbridge_last_error().is_null());
    }
}

#[test]
fn test_null_handle_calls_are_safe() {
    let null: PredictorHandle = ptr::null_mut();

    unsafe {
        netbridge_delete(null);
        netbridge_start_profiling(null, ptr::null(), ptr::null());
        netbridge_end_profiling(null);
        netbridge_disable_profiling(null);

        assert_eq!(netbridge_width(null), 0);
        assert_eq!(netbridge_height(null), 0);
        assert_eq!(netbridge_channels(null), 0);
        assert_eq!(netbridge_pred_len(null), 0);
        assert!(netbridge_get_predictions(null).is_null());

        let input = [0.0f32; 8];
        assert_eq!(netbridge_predict(null, input.as_ptr()), -1);
        assert!(!netbridge_last_error().is_null());

        netbridge_free_string(ptr::null_mut());
    }

    assert_eq!(read_report(null), EMPTY_REPORT);
}

#[test]
fn test_profile_round_trip() {
    let dir = TempDir::new().unwrap();
    let handle = open_picker(&dir, 2);

    let name = CString::new("run").unwrap();
    unsafe {
        netbridge_start_profiling(handle, name.as_ptr(), ptr::null());

        let input = [1.0f32; 8];
        assert_eq!(netbridge_predict(handle, input.as_ptr()), 0);
        netbridge_end_profiling(handle);
    }

    let report: serde_json::Value = serde_json::from_str(&read_report(handle)).unwrap();
    assert_eq!(report["name"], "run");
    assert_eq!(report["metadata"], "");
    let layers = report["layers"].as_array().unwrap();
    assert_eq!(layers.len(), 1);
    assert_eq!(layers[0]["kind"], "inner_product");
    assert_eq!(layers[0]["sequence_index"], 1);
    assert_eq!(layers[0]["shapes"], serde_json::json!([[2, 4], [2]]));

    unsafe {
        netbridge_disable_profiling(handle);
    }
    let cleared: serde_json::Value = serde_json::from_str(&read_report(handle)).unwrap();
    assert_eq!(cleared["name"], "run");
    assert!(cleared["layers"].as_array().unwrap().is_empty());

    unsafe {
        netbridge_delete(handle);
    }
}

#[test]
fn test_predict_error_reporting() {
    let dir = TempDir::new().unwrap();
    let handle = open_picker(&dir, 2);

    unsafe {
        assert_eq!(netbridge_predict(handle, ptr::null()), -1);
        let raw = netbridge_last_error();
        assert!(!raw.is_null());
        let message = CStr::from_ptr(raw).to_str().unwrap();
        assert!(message.contains("null input"), "got: {}", message);

        // A successful call clears the thread's message
        let input = [1.0f32; 8];
        assert_eq!(netbridge_predict(handle, input.as_ptr()), 0);
        assert!(netbridge_last_error().is_null());

        netbridge_delete(handle);
    }
}

#[test]
fn test_first_mode_request_wins() {
    // Every other test in this binary pins CPU, so CPU is first regardless
    // of scheduling and the later GPU request must lose.
    netbridge_set_mode(MODE_CPU);
    netbridge_set_mode(MODE_GPU);

    let dir = TempDir::new().unwrap();
    let (model, trained) = write_pair(&dir);
    let model = c_path(&model);
    let trained = c_path(&trained);

    unsafe {
        let handle = netbridge_new(model.as_ptr(), trained.as_ptr(), 2, MODE_GPU);
        assert!(!handle.is_null());
        assert_eq!((*handle).mode(), ExecutionMode::Cpu);
        netbridge_delete(handle);
    }
}
