//! Integration tests for the task workflow.
//!
//! Tests cover:
//! - Creation defaults and synonym normalization
//! - One-step status moves and the completion photo guard
//! - Photo attachment flipping the documentation flags
//! - The denormalized owning area on nested scopes
//! - Dashboard indicators over the scoped task set

mod common;

use common::*;

#[tokio::test]
async fn test_task_defaults_and_scope_requirement() -> anyhow::Result<()> {
    let (mut controller, _profile, _temp_dir) = create_test_controller().await;

    // No areas yet: nothing is selected, creation must refuse.
    let err = controller
        .create_task(&TaskForm { title: "Too early".into(), ..TaskForm::default() })
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    let area = controller.create_area("Kitchen", "kitchen", None).await?;
    let task = controller
        .create_task(&TaskForm { title: "  Paint walls  ".into(), ..TaskForm::default() })
        .await?;

    assert_eq!(task.title, "Paint walls");
    assert_eq!(task.status, Status::Todo);
    assert_eq!(task.weight, Weight::Medium);
    assert_eq!(task.cost_expected, 0.0);
    assert_eq!(task.cost_real, 0.0);
    assert_eq!(task.area_id, area.id);
    assert_eq!(task.scope.scope_type, ScopeType::Area);
    assert_eq!(task.scope.scope_id, area.id);

    Ok(())
}

#[tokio::test]
async fn test_synonyms_normalize_on_create() -> anyhow::Result<()> {
    let (mut controller, _profile, _temp_dir) = create_test_controller().await;
    controller.create_area("Kitchen", "kitchen", None).await?;

    let task = controller
        .create_task(&TaskForm {
            title: "Trocar torneira".into(),
            status: Some("em andamento".into()),
            weight: Some("pesado".into()),
            due_date: Some("2026-09-15".into()),
            ..TaskForm::default()
        })
        .await?;
    assert_eq!(task.status, Status::Doing);
    assert_eq!(task.weight, Weight::Heavy);
    assert!(task.due_date.is_some());

    let err = controller
        .create_task(&TaskForm {
            title: "Bad status".into(),
            status: Some("finished".into()),
            ..TaskForm::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    Ok(())
}

#[tokio::test]
async fn test_moves_are_one_step_and_photo_guarded() -> anyhow::Result<()> {
    let (mut controller, _profile, _temp_dir) = create_test_controller().await;
    controller.create_area("Kitchen", "kitchen", None).await?;
    let task = controller
        .create_task(&TaskForm { title: "Tile the floor".into(), ..TaskForm::default() })
        .await?;

    // Backward from todo is a no-op, not an error.
    assert!(controller.move_task(task.id, MoveDirection::Back).await?.is_none());

    let doing = controller
        .move_task(task.id, MoveDirection::Forward)
        .await?
        .unwrap();
    assert_eq!(doing.status, Status::Doing);

    // doing -> done requires both photos.
    let err = controller
        .move_task(task.id, MoveDirection::Forward)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    let before = create_test_photo();
    let after = create_test_photo();
    controller
        .attach_photo(task.id, PhotoSlot::Before, before.path().to_path_buf())
        .await?;
    let documented = controller
        .attach_photo(task.id, PhotoSlot::After, after.path().to_path_buf())
        .await?;
    assert!(documented.has_photo_before);
    assert!(documented.has_photo_after);

    let done = controller
        .move_task(task.id, MoveDirection::Forward)
        .await?
        .unwrap();
    assert_eq!(done.status, Status::Done);
    assert!(controller.move_task(task.id, MoveDirection::Forward).await?.is_none());

    // Reverse moves are unconditional.
    let reopened = controller
        .move_task(task.id, MoveDirection::Back)
        .await?
        .unwrap();
    assert_eq!(reopened.status, Status::Doing);

    Ok(())
}

#[tokio::test]
async fn test_status_jump_through_edit_is_rejected() -> anyhow::Result<()> {
    let (mut controller, _profile, _temp_dir) = create_test_controller().await;
    controller.create_area("Kitchen", "kitchen", None).await?;
    let task = controller
        .create_task(&TaskForm { title: "Install shelves".into(), ..TaskForm::default() })
        .await?;

    let err = controller
        .edit_task(
            task.id,
            &TaskPatchForm { status: Some("done".into()), ..TaskPatchForm::default() },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    // The failed patch changed nothing.
    let unchanged = controller
        .scoped_tasks()
        .into_iter()
        .find(|t| t.id == task.id)
        .unwrap();
    assert_eq!(unchanged.status, Status::Todo);

    Ok(())
}

#[tokio::test]
async fn test_invalid_patch_fails_wholesale() -> anyhow::Result<()> {
    let (mut controller, _profile, _temp_dir) = create_test_controller().await;
    controller.create_area("Kitchen", "kitchen", None).await?;
    let task = controller
        .create_task(&TaskForm { title: "Original title".into(), ..TaskForm::default() })
        .await?;

    let err = controller
        .edit_task(
            task.id,
            &TaskPatchForm {
                title: Some("New title".into()),
                weight: Some("gigante".into()),
                ..TaskPatchForm::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    let unchanged = controller
        .scoped_tasks()
        .into_iter()
        .find(|t| t.id == task.id)
        .unwrap();
    assert_eq!(unchanged.title, "Original title", "no partial application");

    Ok(())
}

#[tokio::test]
async fn test_corner_task_carries_owning_area() -> anyhow::Result<()> {
    let (mut controller, _profile, _temp_dir) = create_test_controller().await;
    let area = controller.create_area("Kitchen", "kitchen", None).await?;
    let sub = controller.create_sub_area(area.id, "Counter", None).await?;
    let corner = controller.create_corner(sub.id, "Sink corner", None).await?;

    controller.select_corner(corner.id).await?;
    let task = controller
        .create_task(&TaskForm { title: "Caulk the sink".into(), ..TaskForm::default() })
        .await?;
    assert_eq!(task.scope.scope_type, ScopeType::Corner);
    assert_eq!(task.scope.scope_id, corner.id);
    assert_eq!(task.area_id, area.id, "owning area resolved through the chain");

    // The corner task does not appear when working at the area level.
    controller.select_area(area.id).await?;
    assert!(controller.scoped_tasks().is_empty());
    controller.select_corner(corner.id).await?;
    assert_eq!(controller.scoped_tasks().len(), 1);

    Ok(())
}

#[tokio::test]
async fn test_dashboard_tracks_weighted_progress() -> anyhow::Result<()> {
    let (mut controller, _profile, _temp_dir) = create_test_controller().await;
    controller.create_area("Kitchen", "kitchen", None).await?;

    let light = controller
        .create_task(&TaskForm {
            title: "Swap handles".into(),
            weight: Some("light".into()),
            ..TaskForm::default()
        })
        .await?;
    controller
        .create_task(&TaskForm {
            title: "Replace counter".into(),
            weight: Some("heavy".into()),
            ..TaskForm::default()
        })
        .await?;

    let before = controller.dashboard();
    assert_eq!(before.task_count, 2);
    assert_eq!(before.progress.total_weight, 4);
    assert_eq!(before.progress.percent, 0.0);
    assert_eq!(before.points, 0);

    let before_photo = create_test_photo();
    let after_photo = create_test_photo();
    controller
        .attach_photo(light.id, PhotoSlot::Before, before_photo.path().to_path_buf())
        .await?;
    controller
        .attach_photo(light.id, PhotoSlot::After, after_photo.path().to_path_buf())
        .await?;
    controller.move_task(light.id, MoveDirection::Forward).await?;
    controller.move_task(light.id, MoveDirection::Forward).await?;

    let after = controller.dashboard();
    // 1 of 4 weight units done => 25.0%; one documented light task => 80 pts.
    assert_eq!(after.progress.percent, 25.0);
    assert_eq!(after.points, 80);

    Ok(())
}

#[tokio::test]
async fn test_dashboard_indicators_are_project_wide() -> anyhow::Result<()> {
    let (mut controller, _profile, _temp_dir) = create_test_controller().await;
    let area = controller.create_area("Kitchen", "kitchen", None).await?;
    let sub = controller.create_sub_area(area.id, "Counter", None).await?;
    let corner = controller.create_corner(sub.id, "Sink corner", None).await?;

    controller.select_corner(corner.id).await?;
    let task = controller
        .create_task(&TaskForm { title: "Caulk the sink".into(), ..TaskForm::default() })
        .await?;
    let before = create_test_photo();
    let after = create_test_photo();
    controller
        .attach_photo(task.id, PhotoSlot::Before, before.path().to_path_buf())
        .await?;
    controller
        .attach_photo(task.id, PhotoSlot::After, after.path().to_path_buf())
        .await?;
    controller.move_task(task.id, MoveDirection::Forward).await?;
    controller.move_task(task.id, MoveDirection::Forward).await?;

    // Stepping back up to the area level must not hide the finished work:
    // only the listing is scoped, the indicators cover the whole project.
    controller.select_area(area.id).await?;
    let dash = controller.dashboard();
    assert_eq!(dash.task_count, 0, "the corner task is outside the listing");
    assert_eq!(dash.progress.total_weight, 2);
    assert_eq!(dash.progress.percent, 100.0);
    assert_eq!(dash.points, 160);

    Ok(())
}

#[tokio::test]
async fn test_task_delete_removes_stored_photos() -> anyhow::Result<()> {
    let (db, _temp_dir) = create_test_project().await;
    let mut controller = ProjectController::load(
        db.clone(),
        LocalIdentity::new("tester"),
        CountingProfile::default(),
    )
    .await?;
    controller.create_area("Kitchen", "kitchen", None).await?;
    let task = controller
        .create_task(&TaskForm { title: "Tile the floor".into(), ..TaskForm::default() })
        .await?;

    let first = create_test_photo();
    let task = controller
        .attach_photo(task.id, PhotoSlot::Before, first.path().to_path_buf())
        .await?;
    let first_stored = db.photo_path(task.photo_before_fname.as_deref().unwrap());
    assert!(first_stored.is_file());

    // Replacing a slot drops the superseded file.
    let second = create_test_photo();
    let task = controller
        .attach_photo(task.id, PhotoSlot::Before, second.path().to_path_buf())
        .await?;
    let second_stored = db.photo_path(task.photo_before_fname.as_deref().unwrap());
    assert!(!first_stored.is_file());
    assert!(second_stored.is_file());

    let after = create_test_photo();
    let task = controller
        .attach_photo(task.id, PhotoSlot::After, after.path().to_path_buf())
        .await?;
    let after_stored = db.photo_path(task.photo_after_fname.as_deref().unwrap());
    assert!(after_stored.is_file());

    controller.delete_task(task.id).await?;
    assert!(!second_stored.is_file());
    assert!(!after_stored.is_file());

    Ok(())
}

#[tokio::test]
async fn test_area_cascade_removes_stored_files() -> anyhow::Result<()> {
    let (db, _temp_dir) = create_test_project().await;
    let mut controller = ProjectController::load(
        db.clone(),
        LocalIdentity::new("tester"),
        CountingProfile::default(),
    )
    .await?;
    let cover = create_test_photo();
    let area = controller
        .create_area("Kitchen", "kitchen", Some(cover.path().to_path_buf()))
        .await?;
    let cover_stored = db.photo_path(area.cover_fname.as_deref().unwrap());
    assert!(cover_stored.is_file());

    let sub = controller.create_sub_area(area.id, "Counter", None).await?;
    let corner = controller.create_corner(sub.id, "Sink corner", None).await?;
    controller.select_corner(corner.id).await?;
    let task = controller
        .create_task(&TaskForm { title: "Caulk the sink".into(), ..TaskForm::default() })
        .await?;
    let photo = create_test_photo();
    let task = controller
        .attach_photo(task.id, PhotoSlot::Before, photo.path().to_path_buf())
        .await?;
    let photo_stored = db.photo_path(task.photo_before_fname.as_deref().unwrap());
    assert!(photo_stored.is_file());

    controller.delete_area(area.id).await?;
    assert!(!cover_stored.is_file(), "area cover cleaned up");
    assert!(!photo_stored.is_file(), "cascaded task photo cleaned up");

    Ok(())
}

#[tokio::test]
async fn test_task_persists_through_save_cycle() -> anyhow::Result<()> {
    let temp_dir = tempfile::TempDir::new()?;
    let project_path = temp_dir.path().join("tasks.renoplan");

    {
        let db = ProjectDb::new(&project_path).await?;
        let profile = CountingProfile::default();
        let mut controller =
            ProjectController::load(db.clone(), LocalIdentity::new("tester"), profile).await?;
        controller.create_area("Kitchen", "kitchen", None).await?;
        controller
            .create_task(&TaskForm {
                title: "Paint walls".into(),
                due_date: Some("2026-10-01".into()),
                cost_expected: Some(120.0),
                ..TaskForm::default()
            })
            .await?;
        db.save_project().await?;
    }

    {
        let db = ProjectDb::new(&project_path).await?;
        let tasks = db.get_tasks().await?;
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].title, "Paint walls");
        assert_eq!(tasks[0].cost_expected, 120.0);
        let due = tasks[0].due_date.unwrap();
        assert_eq!((due.year(), due.month() as u8, due.day()), (2026, 10, 1));
    }

    Ok(())
}
