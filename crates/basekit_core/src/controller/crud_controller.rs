//! Action-tagged controller over one [`CrudService`].
//!
//! # Responsibility
//! - Bind each operation to an explicit [`Action`].
//! - Run the permission gate before any service work.
//! - Shape service output and wrap it in a [`ResponseEnvelope`].
//!
//! # Invariants
//! - A denied action never reaches the service.
//! - Service errors are returned unmodified; [`CrudController::respond`]
//!   is the only translation into status codes.

use crate::action::Action;
use crate::context::RequestContext;
use crate::controller::envelope::ResponseEnvelope;
use crate::controller::params::parse_list_query;
use crate::controller::shape::{OutputShape, ServiceOutput};
use crate::error::{CrudError, CrudResult};
use crate::model::payload::Payload;
use crate::model::schema::ValidationError;
use crate::permission::checks::RESOURCE_ID_PARAM;
use crate::permission::gate::PermissionGate;
use crate::repo::Repository;
use crate::service::crud_service::CrudService;
use log::{error, warn};
use serde_json::Value;

const OK_MESSAGE: &str = "Operation successful";
const CREATED_MESSAGE: &str = "Created successfully";
const UPDATED_MESSAGE: &str = "Updated successfully";
const DELETED_MESSAGE: &str = "Deleted successfully";

pub struct CrudController<'a, R: Repository> {
    service: CrudService<'a, R>,
    gate: PermissionGate,
    shape: OutputShape,
}

impl<'a, R: Repository> CrudController<'a, R> {
    pub fn new(service: CrudService<'a, R>, gate: PermissionGate) -> Self {
        Self {
            service,
            gate,
            shape: OutputShape::all(),
        }
    }

    pub fn with_shape(mut self, shape: OutputShape) -> Self {
        self.shape = shape;
        self
    }

    pub fn service(&self) -> &CrudService<'a, R> {
        &self.service
    }

    pub fn list(&self, request: &RequestContext) -> CrudResult<ResponseEnvelope> {
        self.gate.authorize(Action::List, request)?;
        let params = parse_list_query(
            self.entity(),
            &request.query_params,
            self.service.config(),
        )?;
        let page = self.service.list(&params)?;
        Ok(ResponseEnvelope::paginated(
            OK_MESSAGE,
            self.shape.render(ServiceOutput::Records(page.items)),
            page.pagination,
        ))
    }

    pub fn retrieve(&self, request: &RequestContext) -> CrudResult<ResponseEnvelope> {
        self.gate.authorize(Action::Retrieve, request)?;
        let record = self.service.retrieve(self.path_id(request)?)?;
        Ok(ResponseEnvelope::success(
            OK_MESSAGE,
            self.shape.render(ServiceOutput::Record(record)),
        ))
    }

    pub fn create(&self, request: &RequestContext, payload: &Payload) -> CrudResult<ResponseEnvelope> {
        self.gate.authorize(Action::Create, request)?;
        let record = self.service.create(payload)?;
        Ok(ResponseEnvelope::success(
            CREATED_MESSAGE,
            self.shape.render(ServiceOutput::Record(record)),
        ))
    }

    pub fn update(&self, request: &RequestContext, payload: &Payload) -> CrudResult<ResponseEnvelope> {
        self.gate.authorize(Action::Update, request)?;
        let record = self.service.update(self.path_id(request)?, payload)?;
        Ok(ResponseEnvelope::success(
            UPDATED_MESSAGE,
            self.shape.render(ServiceOutput::Record(record)),
        ))
    }

    pub fn delete(&self, request: &RequestContext) -> CrudResult<ResponseEnvelope> {
        self.gate.authorize(Action::Delete, request)?;
        self.service.delete(self.path_id(request)?)?;
        Ok(ResponseEnvelope::success(
            DELETED_MESSAGE,
            self.shape.render(ServiceOutput::Value(Value::Null)),
        ))
    }

    /// Runs the operation bound to `action`; a missing payload is empty.
    pub fn dispatch(
        &self,
        action: Action,
        request: &RequestContext,
        payload: Option<&Payload>,
    ) -> CrudResult<ResponseEnvelope> {
        let empty = Payload::new();
        let payload = payload.unwrap_or(&empty);
        match action {
            Action::List => self.list(request),
            Action::Retrieve => self.retrieve(request),
            Action::Create => self.create(request, payload),
            Action::Update => self.update(request, payload),
            Action::Delete => self.delete(request),
        }
    }

    /// Translates an operation result into `(status_code, envelope)`.
    pub fn respond(
        &self,
        action: Action,
        result: CrudResult<ResponseEnvelope>,
    ) -> (u16, ResponseEnvelope) {
        match result {
            Ok(envelope) if action == Action::Create => (201, envelope),
            Ok(envelope) => (200, envelope),
            Err(err) => {
                let status = err.status_code();
                if status >= 500 {
                    error!(
                        "event=crud_request module=controller status=error action={} entity={} code={} error={}",
                        action,
                        self.entity(),
                        status,
                        err
                    );
                } else {
                    warn!(
                        "event=crud_request module=controller status=rejected action={} entity={} code={} kind={}",
                        action,
                        self.entity(),
                        status,
                        err.kind()
                    );
                }
                (status, ResponseEnvelope::from_error(&err))
            }
        }
    }

    /// [`Self::dispatch`] followed by [`Self::respond`].
    pub fn handle(
        &self,
        action: Action,
        request: &RequestContext,
        payload: Option<&Payload>,
    ) -> (u16, ResponseEnvelope) {
        self.respond(action, self.dispatch(action, request, payload))
    }

    fn entity(&self) -> &str {
        self.service.repository().schema().name()
    }

    fn path_id<'r>(&self, request: &'r RequestContext) -> CrudResult<&'r str> {
        request.path_param(RESOURCE_ID_PARAM).ok_or_else(|| {
            CrudError::from(ValidationError::single(
                self.entity(),
                RESOURCE_ID_PARAM,
                "path parameter is required",
            ))
        })
    }
}
