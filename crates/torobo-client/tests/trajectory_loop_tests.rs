//! 轨迹跟踪控制循环集成测试
//!
//! 使用 `MockDriver`（回显模式）+ 龙门式仿真模型，验证收敛、跳过、
//! 关停、节拍以及释放行为。

mod common;

use approx::assert_relative_eq;
use common::*;
use nalgebra::{DMatrix, Vector3};
use proptest::prelude::*;
use serial_test::serial;
use std::time::Duration;
use torobo_client::{
    ControlError, ControllerConfig, IkBridgeConfig, IkRequestMode, IkServiceError, LinearField,
    RunState, SERVO_OFF_ATTEMPTS, ShutdownSignal, TrajectoryDataset,
};
use torobo_driver::DriverError;
use torobo_driver::mock::DriverCall;

const FAST_HZ: f64 = 1000.0;

fn config(stop_tol: f64, dt: f64) -> ControllerConfig {
    ControllerConfig {
        stop_tol,
        dt,
        ..ControllerConfig::default()
    }
}

#[test]
fn test_converges_along_line() {
    let start = [0.0, 0.0, 0.0];
    let destination = [0.0, 0.0, 1.0];
    let driver = echo_driver(start);
    let mut session = open_session(&driver, start, FAST_HZ);
    let (service, probe) = ScriptedIk::gantry();
    let field = field_for_step(start, destination, 0.1, 0.1);
    let controller = controller(service, field, config(0.05, 0.1));

    let report = controller.run(
        &mut session,
        &two_point_dataset(start, destination),
        &ShutdownSignal::new(),
    );

    assert!(matches!(report.state, RunState::Converged));
    assert_eq!(report.iterations, 10);
    assert_eq!(report.skipped_iterations, 0);
    assert_relative_eq!(report.initial_error.unwrap(), 1.0);
    assert!(report.final_error.unwrap() <= 0.05);
    assert_relative_eq!(report.last_velocity.unwrap(), Vector3::new(0.0, 0.0, 1.0), epsilon = 1e-9);
    assert_relative_eq!(report.last_point.unwrap(), Vector3::new(0.0, 0.0, 1.0), epsilon = 1e-9);

    // 每次迭代两次 IK 调用（x_next + 目标点诊断）
    assert_eq!(probe.call_count(), 20);
    // 归位 + 每次迭代一次运动
    assert_eq!(driver.move_count(), 11);

    // 运动目标沿 z 轴单调前进
    let targets = driver.move_targets();
    for (i, target) in targets[1..].iter().enumerate() {
        assert_relative_eq!(target[2], 0.1 * (i + 1) as f64, epsilon = 1e-9);
    }
}

#[test]
fn test_unit_error_norm_is_exact() {
    // [0,0,0] 与 [0,0,1] 的误差恰好为 1.0
    let start = [0.0, 0.0, 0.0];
    let driver = echo_driver(start);
    let mut session = open_session(&driver, start, FAST_HZ);
    let (service, _probe) = ScriptedIk::gantry();
    let controller = controller(
        service,
        LinearField::new(1.0),
        ControllerConfig {
            max_iterations: Some(0),
            ..config(0.01, 0.1)
        },
    );

    let report = controller.run(
        &mut session,
        &two_point_dataset(start, [0.0, 0.0, 1.0]),
        &ShutdownSignal::new(),
    );
    assert_eq!(report.initial_error, Some(1.0));
    assert!(matches!(report.state, RunState::IterationLimit));
}

#[test]
fn test_already_within_tolerance_runs_zero_iterations() {
    let start = [0.0, 0.0, 0.5];
    let driver = echo_driver(start);
    let mut session = open_session(&driver, start, FAST_HZ);
    let (service, probe) = ScriptedIk::gantry();
    let controller = controller(service, LinearField::new(1.0), config(1.0, 0.1));

    let report = controller.run(
        &mut session,
        &two_point_dataset([0.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
        &ShutdownSignal::new(),
    );

    assert!(matches!(report.state, RunState::Converged));
    assert_eq!(report.iterations, 0);
    assert_relative_eq!(report.initial_error.unwrap(), 0.5);
    assert!(report.last_point.is_none());
    assert!(report.last_velocity.is_none());
    assert!(report.last_target_joints.is_none());
    assert_eq!(probe.call_count(), 0);
    // 只有归位运动
    assert_eq!(driver.move_count(), 1);
}

#[test]
fn test_transient_ik_failures_skip_iterations() {
    let start = [0.0, 0.0, 0.0];
    let destination = [0.0, 0.0, 1.0];
    let driver = echo_driver(start);
    let mut session = open_session(&driver, start, FAST_HZ);
    let unavailable = || Err(IkServiceError::Unavailable("solver restarting".to_string()));
    let (service, probe) = ScriptedIk::with_script(vec![unavailable(), unavailable(), unavailable()]);
    let controller = controller(
        service,
        field_for_step(start, destination, 0.1, 0.1),
        ControllerConfig {
            max_iterations: Some(4),
            ..config(0.01, 0.1)
        },
    );

    let report = controller.run(
        &mut session,
        &two_point_dataset(start, destination),
        &ShutdownSignal::new(),
    );

    assert!(matches!(report.state, RunState::IterationLimit));
    assert_eq!(report.iterations, 4);
    assert_eq!(report.skipped_iterations, 3);
    // 迭代 1-3 没有运动，迭代 4 恰好一次
    assert_eq!(driver.move_count(), 1 + 1);
    // 3 次失败 + 第 4 次迭代的两次调用
    assert_eq!(probe.call_count(), 5);
    // 跳过的迭代不更新误差
    assert_relative_eq!(report.final_error.unwrap(), 0.9, epsilon = 1e-9);
}

#[test]
fn test_no_solution_is_transient() {
    let start = [0.0, 0.0, 0.0];
    let destination = [0.0, 0.0, 1.0];
    let driver = echo_driver(start);
    let mut session = open_session(&driver, start, FAST_HZ);
    let (service, _probe) = ScriptedIk::with_script(vec![Err(IkServiceError::NoSolution)]);
    let controller = controller(
        service,
        field_for_step(start, destination, 0.25, 0.1),
        config(0.2, 0.1),
    );

    let report = controller.run(
        &mut session,
        &two_point_dataset(start, destination),
        &ShutdownSignal::new(),
    );
    assert!(matches!(report.state, RunState::Converged));
    assert_eq!(report.skipped_iterations, 1);
    assert_eq!(report.iterations, 1 + 4);
}

#[test]
fn test_too_many_consecutive_skips_fail_the_run() {
    let start = [0.0, 0.0, 0.0];
    let driver = echo_driver(start);
    let mut session = open_session(&driver, start, FAST_HZ);
    let script = (0..10).map(|_| Err(IkServiceError::NoSolution)).collect();
    let (service, _probe) = ScriptedIk::with_script(script);
    let controller = controller(
        service,
        LinearField::new(1.0),
        ControllerConfig {
            max_consecutive_skips: 2,
            ..config(0.01, 0.1)
        },
    );

    let report = controller.run(
        &mut session,
        &two_point_dataset(start, [0.0, 0.0, 1.0]),
        &ShutdownSignal::new(),
    );

    assert_eq!(report.iterations, 3);
    match report.state {
        RunState::Failed(ControlError::ConsecutiveFailures { count, last_error }) => {
            assert_eq!(count, 3);
            assert!(matches!(*last_error, ControlError::IkUnreachable));
        },
        other => panic!("unexpected state: {:?}", other),
    }
    assert_eq!(driver.move_count(), 1);
}

#[test]
fn test_slow_ik_service_is_skipped() {
    let start = [0.0, 0.0, 0.0];
    let destination = [0.0, 0.0, 1.0];
    let driver = echo_driver(start);
    let mut session = open_session(&driver, start, FAST_HZ);
    let (service, _probe) = ScriptedIk::gantry();
    let service = service.with_delay(Duration::from_millis(100));
    let controller = controller_with_ik(
        service,
        IkBridgeConfig {
            timeout_ms: 10,
            ..IkBridgeConfig::default()
        },
        field_for_step(start, destination, 0.1, 0.1),
        ControllerConfig {
            max_iterations: Some(2),
            ..config(0.01, 0.1)
        },
    );

    let report = controller.run(
        &mut session,
        &two_point_dataset(start, destination),
        &ShutdownSignal::new(),
    );
    assert!(matches!(report.state, RunState::IterationLimit));
    assert_eq!(report.skipped_iterations, 2);
    assert_eq!(driver.move_count(), 1);
}

#[test]
fn test_shutdown_during_second_iteration() {
    let start = [0.0, 0.0, 0.0];
    let destination = [0.0, 0.0, 1.0];
    let driver = echo_driver(start);
    let shutdown = ShutdownSignal::new();
    let mut session = open_session(&driver, start, FAST_HZ);

    // 第 3 次成功运动 = 归位 + 迭代 1 + 迭代 2
    let trigger = shutdown.clone();
    driver.set_on_move(move |count| {
        if count == 3 {
            trigger.trigger();
        }
    });

    let (service, _probe) = ScriptedIk::gantry();
    let controller = controller(
        service,
        field_for_step(start, destination, 0.1, 0.1),
        config(0.01, 0.1),
    );
    let report = controller.run(&mut session, &two_point_dataset(start, destination), &shutdown);

    assert!(matches!(report.state, RunState::Cancelled));
    assert_eq!(report.iterations, 2);
    assert_eq!(driver.move_count(), 3);
    assert_relative_eq!(report.last_point.unwrap(), Vector3::new(0.0, 0.0, 0.2), epsilon = 1e-9);

    drop(session);
    assert_eq!(driver.servo_off_attempts(), SERVO_OFF_ATTEMPTS);
    assert_eq!(
        driver.count_calls(|c| *c == DriverCall::SendCurrents(vec![0.0; JOINTS])),
        1
    );
}

#[test]
fn test_shutdown_before_first_iteration() {
    let start = [0.0, 0.0, 0.0];
    let driver = echo_driver(start);
    let mut session = open_session(&driver, start, FAST_HZ);
    let shutdown = ShutdownSignal::new();
    shutdown.trigger();

    let (service, probe) = ScriptedIk::gantry();
    let controller = controller(service, LinearField::new(1.0), config(0.01, 0.1));
    let report = controller.run(&mut session, &two_point_dataset(start, [0.0, 0.0, 1.0]), &shutdown);

    assert!(matches!(report.state, RunState::Cancelled));
    assert_eq!(report.iterations, 0);
    assert!(report.last_point.is_none());
    assert_eq!(probe.call_count(), 0);
}

#[test]
fn test_missing_telemetry_is_fatal() {
    let driver = echo_driver([0.0; 3]);
    let mut session = open_session(&driver, [0.0; 3], FAST_HZ);
    driver.clear_telemetry();

    let (service, _probe) = ScriptedIk::gantry();
    let controller = controller(service, LinearField::new(1.0), config(0.01, 0.1));
    let report = controller.run(
        &mut session,
        &two_point_dataset([0.0; 3], [0.0, 0.0, 1.0]),
        &ShutdownSignal::new(),
    );

    assert!(matches!(report.state, RunState::Failed(ControlError::DriverUnavailable)));
    assert!(report.initial_error.is_none());
    assert!(report.into_result().is_err());
}

#[test]
fn test_dispatch_failure_is_fatal_and_session_still_releases() {
    let start = [0.0, 0.0, 0.0];
    let driver = echo_driver(start);
    let mut session = open_session(&driver, start, FAST_HZ);
    driver.set_fail_moves(true);

    let (service, _probe) = ScriptedIk::gantry();
    let controller = controller(service, LinearField::new(1.0), config(0.01, 0.1));
    let report = controller.run(
        &mut session,
        &two_point_dataset(start, [0.0, 0.0, 1.0]),
        &ShutdownSignal::new(),
    );

    match report.state {
        RunState::Failed(ControlError::MotionDispatchFailure { stage, source }) => {
            assert_eq!(stage, "move_joints");
            assert!(matches!(source, DriverError::Rejected { .. }));
        },
        other => panic!("unexpected state: {:?}", other),
    }
    assert_eq!(report.iterations, 0);

    drop(session);
    assert_eq!(driver.servo_off_attempts(), SERVO_OFF_ATTEMPTS);
    assert!(!driver.servo_enabled());
}

#[test]
fn test_field_with_wrong_dimension_is_fatal() {
    let driver = echo_driver([0.0; 3]);
    let mut session = open_session(&driver, [0.0; 3], FAST_HZ);
    let (service, _probe) = ScriptedIk::gantry();
    let field = |e: &DMatrix<f64>| DMatrix::<f64>::zeros(6, e.ncols());
    let controller = controller(service, field, config(0.01, 0.1));

    let report = controller.run(
        &mut session,
        &two_point_dataset([0.0; 3], [0.0, 0.0, 1.0]),
        &ShutdownSignal::new(),
    );
    assert!(matches!(
        report.state,
        RunState::Failed(ControlError::FieldDimension { expected: 3, rows: 6 })
    ));
}

#[test]
fn test_ik_requests_carry_target_and_seed() {
    let start = [0.0, 0.0, 0.0];
    let destination = [0.0, 0.0, 1.0];
    let driver = echo_driver(start);
    let mut session = open_session(&driver, start, FAST_HZ);
    let (service, probe) = ScriptedIk::gantry();
    let controller = controller(
        service,
        field_for_step(start, destination, 0.1, 0.1),
        ControllerConfig {
            max_iterations: Some(2),
            ..config(0.01, 0.1)
        },
    );
    controller.run(&mut session, &two_point_dataset(start, destination), &ShutdownSignal::new());

    let requests = probe.requests.lock().clone();
    assert_eq!(requests.len(), 4);
    // 第二次迭代：x_next 以当前关节为种子
    assert_relative_eq!(requests[2].linear, Vector3::new(0.0, 0.0, 0.2), epsilon = 1e-9);
    assert_relative_eq!(requests[2].q_in[2], 0.1, epsilon = 1e-9);
    // 目标点诊断请求使用零种子
    assert_eq!(requests[3].linear, Vector3::new(0.0, 0.0, 1.0));
    assert_eq!(requests[3].q_in, vec![0.0; JOINTS]);
}

#[test]
fn test_fixed_reference_mode_sends_constant_pose() {
    let start = [0.0, 0.0, 0.0];
    let driver = echo_driver(start);
    let mut session = open_session(&driver, start, FAST_HZ);
    let (service, probe) = ScriptedIk::gantry();
    let controller = controller_with_ik(
        service,
        IkBridgeConfig {
            mode: IkRequestMode::FixedReference,
            ..IkBridgeConfig::default()
        },
        LinearField::new(1.0),
        ControllerConfig {
            max_iterations: Some(3),
            ..config(0.01, 0.1)
        },
    );
    controller.run(&mut session, &two_point_dataset(start, [0.0, 0.0, 1.0]), &ShutdownSignal::new());

    let requests = probe.requests.lock().clone();
    assert_eq!(requests.len(), 6);
    for request in &requests {
        assert_eq!(request.linear, Vector3::new(-0.191556, -0.216731, 0.963396));
    }
}

#[test]
fn test_stacked_dataset_uses_position_rows() {
    // 六维点（位置 + 速度），只有前三维参与误差和积分
    let start = [0.0, 0.0, 0.0];
    let driver = echo_driver(start);
    let mut session = open_session(&driver, start, FAST_HZ);
    let dataset = TrajectoryDataset::from_points(&[
        vec![0.0, 0.0, 0.0, 5.0, 5.0, 5.0],
        vec![0.0, 0.0, 1.0, 0.0, 0.0, 0.0],
    ])
    .unwrap();
    let (service, _probe) = ScriptedIk::gantry();
    let controller = controller(service, LinearField::new(2.5), config(0.2, 0.1));

    let report = controller.run(&mut session, &dataset, &ShutdownSignal::new());
    assert!(matches!(report.state, RunState::Converged));
    assert_eq!(report.iterations, 4);
}

#[test]
#[serial]
fn test_commands_are_paced_despite_ik_latency() {
    let start = [0.0, 0.0, 0.0];
    let destination = [0.0, 0.0, 1.0];
    let driver = echo_driver(start);
    let mut session = open_session(&driver, start, 50.0);
    let (service, _probe) = ScriptedIk::gantry();
    let controller = controller(
        service.with_delay(Duration::from_millis(3)),
        field_for_step(start, destination, 0.1, 0.1),
        ControllerConfig {
            max_iterations: Some(5),
            ..config(0.01, 0.1)
        },
    );

    controller.run(&mut session, &two_point_dataset(start, destination), &ShutdownSignal::new());

    let stamps = driver.move_timestamps();
    assert_eq!(stamps.len(), 6);
    for pair in stamps[1..].windows(2) {
        let gap = pair[1] - pair[0];
        assert!(gap >= Duration::from_millis(19), "gap {:?} shorter than period", gap);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn prop_terminates_within_bound(distance in 0.2f64..1.5, step in 0.05f64..0.4) {
        let start = [0.0, 0.0, 0.0];
        let destination = [0.0, 0.0, distance];
        let driver = echo_driver(start);
        let mut session = open_session(&driver, start, 2000.0);
        let (service, _probe) = ScriptedIk::gantry();
        let controller = controller(
            service,
            field_for_step(start, destination, step, 0.1),
            config(step, 0.1),
        );

        let report = controller.run(
            &mut session,
            &two_point_dataset(start, destination),
            &ShutdownSignal::new(),
        );

        prop_assert!(matches!(report.state, RunState::Converged));
        let bound = (distance / step).ceil() as usize;
        prop_assert!(report.iterations <= bound, "{} > {}", report.iterations, bound);
    }
}
