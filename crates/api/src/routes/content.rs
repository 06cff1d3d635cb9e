//! Sections, modules and pages.

use axum::extract::State;
use axum::routing::{get, put};
use axum::{Json, Router};
use services::NewPage;
use training_core::model::{
    ModuleDraft, ModuleId, ModulePatch, PageId, PageKind, PagePatch, SectionDraft, SectionId,
    SectionPatch,
};

use crate::dto::{
    AssignSectionBody, CreateModuleBody, CreatePageBody, CreateSectionBody, Message, ModuleDto,
    PageDto, SectionDto, UpdateModuleBody, UpdatePageBody, UpdateSectionBody,
};
use crate::error::ApiError;
use crate::extract::{AdminUser, ApiJson, ApiPath, CurrentUser};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/sections", get(list_sections).post(create_section))
        .route(
            "/api/sections/:id",
            put(update_section).delete(delete_section),
        )
        .route("/api/sections/:id/modules", get(list_section_modules))
        .route("/api/modules", get(list_modules).post(create_module))
        .route(
            "/api/modules/:id",
            get(get_module).put(update_module).delete(delete_module),
        )
        .route("/api/modules/:id/section", put(assign_section))
        .route("/api/modules/:id/pages", get(list_pages).post(create_page))
        .route("/api/pages/:id", put(update_page).delete(delete_page))
}

async fn list_sections(
    _user: CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<SectionDto>>, ApiError> {
    let sections = state.services.sections().list_sections().await?;
    Ok(Json(sections.into_iter().map(SectionDto::from).collect()))
}

async fn create_section(
    _admin: AdminUser,
    State(state): State<AppState>,
    ApiJson(body): ApiJson<CreateSectionBody>,
) -> Result<Json<SectionDto>, ApiError> {
    let section = state
        .services
        .sections()
        .create_section(SectionDraft {
            title: body.title,
            description: body.description,
            order: body.order,
        })
        .await?;
    Ok(Json(section.into()))
}

async fn update_section(
    _admin: AdminUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<SectionId>,
    ApiJson(body): ApiJson<UpdateSectionBody>,
) -> Result<Json<SectionDto>, ApiError> {
    let section = state
        .services
        .sections()
        .update_section(
            id,
            SectionPatch {
                title: body.title,
                description: body.description,
                order: body.order,
            },
        )
        .await?;
    Ok(Json(section.into()))
}

async fn delete_section(
    _admin: AdminUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<SectionId>,
) -> Result<Json<Message>, ApiError> {
    state.services.sections().delete_section(id).await?;
    Ok(Json(Message::new("Section deleted successfully")))
}

async fn list_section_modules(
    _user: CurrentUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<SectionId>,
) -> Result<Json<Vec<ModuleDto>>, ApiError> {
    let modules = state.services.modules().list_modules_by_section(id).await?;
    Ok(Json(modules.into_iter().map(ModuleDto::from).collect()))
}

async fn list_modules(
    _user: CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<ModuleDto>>, ApiError> {
    let modules = state.services.modules().list_modules().await?;
    Ok(Json(modules.into_iter().map(ModuleDto::from).collect()))
}

async fn get_module(
    _user: CurrentUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<ModuleId>,
) -> Result<Json<ModuleDto>, ApiError> {
    Ok(Json(state.services.modules().get_module(id).await?.into()))
}

async fn create_module(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    ApiJson(body): ApiJson<CreateModuleBody>,
) -> Result<Json<ModuleDto>, ApiError> {
    let module = state
        .services
        .modules()
        .create_module(ModuleDraft {
            section_id: body.section_id,
            title: body.title,
            description: body.description,
            order: body.order,
            estimated_minutes: body.estimated_duration,
        })
        .await?;
    tracing::debug!(admin = %admin.id, module_id = %module.id, "module created via api");
    Ok(Json(module.into()))
}

async fn update_module(
    _admin: AdminUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<ModuleId>,
    ApiJson(body): ApiJson<UpdateModuleBody>,
) -> Result<Json<ModuleDto>, ApiError> {
    let module = state
        .services
        .modules()
        .update_module(
            id,
            ModulePatch {
                section_id: body.section_id,
                title: body.title,
                description: body.description,
                order: body.order,
                estimated_minutes: body.estimated_duration,
            },
        )
        .await?;
    Ok(Json(module.into()))
}

async fn delete_module(
    _admin: AdminUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<ModuleId>,
) -> Result<Json<Message>, ApiError> {
    state.services.modules().delete_module(id).await?;
    Ok(Json(Message::new("Module deleted successfully")))
}

async fn assign_section(
    _admin: AdminUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<ModuleId>,
    ApiJson(body): ApiJson<AssignSectionBody>,
) -> Result<Json<ModuleDto>, ApiError> {
    let module = state
        .services
        .modules()
        .assign_section(id, body.section_id)
        .await?;
    Ok(Json(module.into()))
}

async fn list_pages(
    _user: CurrentUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<ModuleId>,
) -> Result<Json<Vec<PageDto>>, ApiError> {
    let pages = state.services.modules().list_pages(id).await?;
    Ok(Json(pages.into_iter().map(PageDto::from).collect()))
}

async fn create_page(
    _admin: AdminUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<ModuleId>,
    ApiJson(body): ApiJson<CreatePageBody>,
) -> Result<Json<PageDto>, ApiError> {
    let kind = PageKind::parse(&body.page_type).map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let page = state
        .services
        .modules()
        .create_page(
            id,
            NewPage {
                page_order: body.page_order,
                kind,
                title: body.title,
                content: body.content,
            },
        )
        .await?;
    Ok(Json(page.into()))
}

async fn update_page(
    _admin: AdminUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<PageId>,
    ApiJson(body): ApiJson<UpdatePageBody>,
) -> Result<Json<PageDto>, ApiError> {
    let kind = body
        .page_type
        .as_deref()
        .map(PageKind::parse)
        .transpose()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let page = state
        .services
        .modules()
        .update_page(
            id,
            PagePatch {
                page_order: body.page_order,
                kind,
                title: body.title,
                content: body.content,
            },
        )
        .await?;
    Ok(Json(page.into()))
}

async fn delete_page(
    _admin: AdminUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<PageId>,
) -> Result<Json<Message>, ApiError> {
    state.services.modules().delete_page(id).await?;
    Ok(Json(Message::new("Module page deleted successfully")))
}
